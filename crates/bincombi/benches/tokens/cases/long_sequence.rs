use super::super::Parseable;

/// Single byte fields, back to back.
#[derive(PartialEq, Eq, Debug)]
pub struct LongSequence {
    pub values: Vec<u8>,
}

impl Parseable for LongSequence {
    type Param = usize;

    fn generate_case(param: Self::Param) -> Self {
        LongSequence {
            values: (0..param).map(|i| (i % 256) as u8).collect(),
        }
    }

    fn generate_bytes(&self) -> Vec<u8> {
        self.values.clone()
    }
}
