mod linked_list;
mod long_sequence;
mod varint_list;

pub use linked_list::{LinkedList, NODE_SIZE};
pub use long_sequence::LongSequence;
pub use varint_list::VarintList;
