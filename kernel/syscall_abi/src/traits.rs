use crate::errors::SyscallError;
use core::fmt::Debug;

/// Ties a syscall number to the types of its arguments and its result
pub trait SyscallBinding {
    const SYSCALL_NO: usize;

    /// The arguments of the syscall.
    ///
    /// Tasks encode them into registers and the kernel decodes them again, so both directions of the conversion
    /// must exist.
    type CallArgs: TryFrom<RawSyscallArgs> + Into<RawSyscallArgs> + Debug;

    /// The result of the syscall, encoded the same way in the opposite direction
    type Return: FromRawSysResponse + IntoRawSysResponse + Debug;
}

/// Registers `a1-a7` when entering the kernel
pub type RawSyscallArgs = [usize; 7];

/// Registers `a0-a7` when returning from the kernel
pub type RawSyscallReturn = [usize; 8];

/// Registers `a1-a7` of a successful return
pub type SyscallReturnData = [usize; 7];

/// Placeholder for syscalls without arguments or without a result value
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct NoValue;

impl From<SyscallReturnData> for NoValue {
    fn from(_: SyscallReturnData) -> Self {
        NoValue
    }
}

impl From<NoValue> for SyscallReturnData {
    fn from(_: NoValue) -> Self {
        [0; 7]
    }
}

pub trait FromRawSysResponse {
    fn from_response(raw: RawSyscallReturn) -> Self;
}

pub trait IntoRawSysResponse {
    fn into_response(self) -> RawSyscallReturn;
}

pub type SyscallResult<T> = Result<T, SyscallError>;

impl<T: Into<SyscallReturnData>> IntoRawSysResponse for SyscallResult<T> {
    fn into_response(self) -> RawSyscallReturn {
        let mut raw = [0; 8];
        match self {
            Ok(value) => raw[1..].copy_from_slice(&value.into()),
            Err(e) => raw[0] = e as usize,
        }
        raw
    }
}

impl<T: TryFrom<SyscallReturnData>> FromRawSysResponse for SyscallResult<T> {
    fn from_response(raw: RawSyscallReturn) -> Self {
        let [status, data @ ..] = raw;
        if status != 0 {
            return Err(SyscallError::try_from(status).unwrap_or(SyscallError::UnknownError));
        }
        T::try_from(data).map_err(|_| SyscallError::ValueInvalid)
    }
}
