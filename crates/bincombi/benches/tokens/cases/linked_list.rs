use super::super::Parseable;

/// Nodes of a value byte and a 4 byte big-endian offset of the next node, 0 for the last.
#[derive(PartialEq, Eq, Debug)]
pub struct LinkedList {
    pub values: Vec<u8>,
}

pub const NODE_SIZE: u32 = 5;

impl Parseable for LinkedList {
    type Param = usize;

    fn generate_case(param: Self::Param) -> Self {
        LinkedList {
            values: (0..param).map(|i| (i % 255) as u8 + 1).collect(),
        }
    }

    fn generate_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (i, value) in self.values.iter().enumerate() {
            let next = if i + 1 == self.values.len() {
                0
            } else {
                (i as u32 + 1) * NODE_SIZE
            };
            bytes.push(*value);
            bytes.extend_from_slice(&next.to_be_bytes());
        }
        bytes
    }
}
