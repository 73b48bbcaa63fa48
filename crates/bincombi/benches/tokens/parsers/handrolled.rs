use super::super::{LinkedList, LongSequence, Parse, VarintList};
use crate::cases::NODE_SIZE;

pub struct HandRolled;

impl Parse<LongSequence> for HandRolled {
    fn parse(input: &[u8]) -> LongSequence {
        LongSequence {
            values: input.to_vec(),
        }
    }
}

impl Parse<LinkedList> for HandRolled {
    fn parse(input: &[u8]) -> LinkedList {
        let mut values = Vec::new();
        let mut at = 0;
        loop {
            let node = &input[at..at + NODE_SIZE as usize];
            values.push(node[0]);
            let next = u32::from_be_bytes([node[1], node[2], node[3], node[4]]) as usize;
            if next == 0 {
                break;
            }
            at = next;
        }
        LinkedList { values }
    }
}

impl Parse<VarintList> for HandRolled {
    fn parse(input: &[u8]) -> VarintList {
        let mut values = Vec::new();
        let mut value = 0;
        let mut shift = 0;
        for byte in input {
            value |= u64::from(byte & 0x7F) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                values.push(value);
                value = 0;
                shift = 0;
            }
        }
        VarintList { values }
    }
}
