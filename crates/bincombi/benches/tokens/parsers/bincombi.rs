use bincombi::{
    add, and, cho, con, def, def_where, eq_num, fold_right, gt_num, last, len, local_refs, parse,
    recursive, ref_, rep, selection::get_all_values, seq, seqs, shl, sub, tie, Encoding,
    ParseState, Source, Token,
};

use super::super::{LinkedList, LongSequence, Parse, VarintList};

pub struct Bincombi;

fn quick_parse(token: &Token, input: &[u8]) -> ParseState {
    parse(Source::from_bytes(input), token, Encoding::new())
        .unwrap()
        .unwrap()
}

fn bytes_of(state: &ParseState, name: &str) -> Vec<u8> {
    get_all_values(state.graph(), name)
        .iter()
        .map(|v| v.bytes()[0])
        .collect()
}

impl Parse<LongSequence> for Bincombi {
    fn parse(input: &[u8]) -> LongSequence {
        let state = quick_parse(&rep(def("value", 1)), input);
        LongSequence {
            values: bytes_of(&state, "value"),
        }
    }
}

impl Parse<LinkedList> for Bincombi {
    fn parse(input: &[u8]) -> LinkedList {
        let list = recursive(|node| {
            seq(
                def("value", 1),
                cho(
                    def_where("next", 4, eq_num(0)),
                    seq(def("next", 4), sub(node, last(ref_("next")))),
                ),
            )
        });
        let state = quick_parse(&list, input);
        LinkedList {
            values: bytes_of(&state, "value"),
        }
    }
}

impl Parse<VarintList> for Bincombi {
    fn parse(input: &[u8]) -> VarintList {
        let decoded = fold_right(
            and(local_refs(&["cont", "end"], 0), con(0x7F)),
            |low, high| add(low, shl(high, con(7))),
        );
        let varint = seqs!(
            rep(def_where("cont", 1, gt_num(127))),
            def("end", 1),
            tie(def("value", last(len(decoded.clone()))), decoded),
        );
        let state = quick_parse(&rep(varint), input);
        VarintList {
            values: get_all_values(state.graph(), "value")
                .iter()
                .filter_map(|v| v.as_u64())
                .collect(),
        }
    }
}
