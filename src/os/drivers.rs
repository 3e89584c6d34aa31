//! generic drivers module

// pflag operation Enumerator
pub enum PflagOp {
    Set,
    Unset,
}
