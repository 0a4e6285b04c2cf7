/// Error types that can occur during CHIP-8 emulation.
///
/// Every fallible core operation reports one of these instead of clamping or
/// silently recovering; the cycle driver decides what to do with it.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmulatorError {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },

    #[error("stack overflow: more than 16 nested subroutine calls")]
    StackOverflow,

    #[error("stack underflow: attempted to return with an empty call stack")]
    StackUnderflow,

    #[error("unknown opcode {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },

    #[error("invalid register index {index:#04X}")]
    InvalidRegisterIndex { index: u8 },
}
