//! Opcodes of the reference encoding

/// First byte of every encoded op
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// End of the script
    Stop = 0x00,
    /// Skip bytes of the original, payload omitted
    Delete = 0x01,
    /// Emit the payload that follows
    Insert = 0x02,
    /// Retain bytes of the original
    Copy = 0x03,
    /// Skip bytes of the original, payload kept for undo
    DeleteWithPayload = 0x04,
}

impl Opcode {
    /// Convert from byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Stop),
            0x01 => Some(Self::Delete),
            0x02 => Some(Self::Insert),
            0x03 => Some(Self::Copy),
            0x04 => Some(Self::DeleteWithPayload),
            _ => None,
        }
    }

    /// Convert to byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether a run length follows the opcode
    pub fn requires_run(self) -> bool {
        !matches!(self, Self::Stop)
    }

    /// Whether `run` payload bytes follow the run length
    pub fn requires_data(self) -> bool {
        matches!(self, Self::Insert | Self::DeleteWithPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::Stop as u8, 0x00);
        assert_eq!(Opcode::Delete as u8, 0x01);
        assert_eq!(Opcode::Insert as u8, 0x02);
        assert_eq!(Opcode::Copy as u8, 0x03);
        assert_eq!(Opcode::DeleteWithPayload as u8, 0x04);
    }

    #[test]
    fn test_opcode_from_u8() {
        for byte in 0x00..=0x04 {
            assert_eq!(Opcode::from_u8(byte).map(Opcode::as_u8), Some(byte));
        }
        assert_eq!(Opcode::from_u8(0x05), None);
        assert_eq!(Opcode::from_u8(0xFF), None);
    }

    #[test]
    fn test_operand_layout() {
        assert!(!Opcode::Stop.requires_run());
        assert!(Opcode::Copy.requires_run() && !Opcode::Copy.requires_data());
        assert!(Opcode::Delete.requires_run() && !Opcode::Delete.requires_data());
        assert!(Opcode::Insert.requires_data());
        assert!(Opcode::DeleteWithPayload.requires_data());
    }
}
