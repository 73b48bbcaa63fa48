//! Benchmarks for bincombi, compared with a parser written by hand for the same format.
//! - each case is in [`cases`], and generates input that parses.
//! - both parsers must agree on the result before a case is measured.
//!
//! | Method | Reason for inclusion |
//! | Bincombi | is this library |
//! | Hand-Rolled | The lower bound, a direct loop over the bytes |
//!
use std::fmt::Debug;

mod cases;
use cases::{LinkedList, LongSequence, VarintList};
mod parsers;
use parsers::{bincombi::Bincombi, handrolled::HandRolled};

trait Parseable: Eq + PartialEq + Debug {
    type Param;
    fn generate_case(param: Self::Param) -> Self;
    fn generate_bytes(&self) -> Vec<u8>;
}

trait Parse<O> {
    fn parse(input: &[u8]) -> O;
}

macro_rules! impl_cases {
    ($($case:ident as $name:ident for [ $($arg:tt)* ] ),* ) => {
        $(
            #[divan::bench(
                name = stringify!($name),
                types = [Bincombi, HandRolled],
                args = [ $($arg)* ]
            )]
            fn $name<P: Parse<$case>>(bencher: divan::Bencher, param: <$case as Parseable>::Param) {
                let o = $case::generate_case(param);
                let bytes = o.generate_bytes();
                assert_eq!(P::parse(&bytes), o);
                bencher.bench_local(|| {
                    P::parse(&bytes)
                })
            }
        )*
    }
}

impl_cases! {
    LongSequence as long_sequence for [0, 100, 100000],
    LinkedList as linked_list for [1, 64, 256],
    VarintList as varint_list for [1, 100, 10000]
}

fn main() {
    divan::main();
}
