//! Helper macros

/// Helper to build a sequence of more than two tokens.
/// ```
/// # use bincombi::{seqs, def, Token};
/// let header: Token = seqs!(def("magic", 4), def("version", 1), def("flags", 1));
/// ```
#[macro_export]
macro_rules! seqs {
    ($first:expr, $second:expr $(, $rest:expr)* $(,)?) => {
        $crate::token::seq_many($first, $second, vec![$($rest),*])
    };
}

/// Helper to build a choice between more than two tokens, tried in order.
/// ```
/// # use bincombi::{chos, def_where, def, eq_num, Token};
/// let tag: Token = chos!(
///     def_where("small", 1, eq_num(1)),
///     def_where("large", 1, eq_num(2)),
///     def("other", 1),
/// );
/// ```
#[macro_export]
macro_rules! chos {
    ($first:expr, $second:expr $(, $rest:expr)* $(,)?) => {
        $crate::token::cho_many($first, $second, vec![$($rest),*])
    };
}
