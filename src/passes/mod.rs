//! Representative lowering passes (C5, C6) plus the emitter-adjacent
//! entrypoint-arg remap (C8), each a thin free function around a
//! [`crate::rewrite::RewritePass`] impl.
pub mod entry_point_args;
pub mod mask_lowering;
pub mod stack_opt;
