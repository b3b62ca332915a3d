/// Error codes which are returned to a task in register `a0` when a syscall fails
#[repr(usize)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SyscallError {
    NoMem = 2,
    InvalidArg = 6,
    Unsupported = 9,
    NotFound = 13,
    /// A task supplied memory range is not (completely) mapped for the task or does not permit the access
    InvalidAccess = 14,
    /// A one-shot operation has already been performed
    AlreadyRegistered = 15,
    /// The kernel returned a success value that could not be decoded
    ValueInvalid = usize::MAX - 2,
    UnknownError = usize::MAX - 1,
    UnknownSyscall = usize::MAX,
}

impl SyscallError {
    const ALL: [SyscallError; 9] = [
        SyscallError::NoMem,
        SyscallError::InvalidArg,
        SyscallError::Unsupported,
        SyscallError::NotFound,
        SyscallError::InvalidAccess,
        SyscallError::AlreadyRegistered,
        SyscallError::ValueInvalid,
        SyscallError::UnknownError,
        SyscallError::UnknownSyscall,
    ];
}

impl TryFrom<usize> for SyscallError {
    type Error = ();

    fn try_from(code: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| *e as usize == code)
            .ok_or(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_every_code_decodes_back() {
        for e in SyscallError::ALL {
            assert_eq!(SyscallError::try_from(e as usize), Ok(e));
        }
        assert_eq!(SyscallError::try_from(0), Err(()));
    }
}
