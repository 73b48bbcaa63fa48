use super::super::Parseable;

/// Unsigned LEB128 numbers, back to back.
#[derive(PartialEq, Eq, Debug)]
pub struct VarintList {
    pub values: Vec<u64>,
}

impl Parseable for VarintList {
    type Param = usize;

    fn generate_case(param: Self::Param) -> Self {
        VarintList {
            values: (0..param as u64).map(|i| i * i * 7919).collect(),
        }
    }

    fn generate_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for value in &self.values {
            let mut rest = *value;
            while rest >= 0x80 {
                bytes.push((rest & 0x7F) as u8 | 0x80);
                rest >>= 7;
            }
            bytes.push(rest as u8);
        }
        bytes
    }
}
