//! Stack optimization (C6): elides `push_stack`/`pop_stack` pairs whose
//! intermediate value is never observed outside straight-line code, grounded
//! in `original_source/src/shady/passes/opt_stack.c`'s frame-threading walk.
use std::rc::Rc;

use crate::arena::IrArena;
use crate::config::Config;
use crate::error::Result;
use crate::node::{nodes, LetPayload, Node, NodeId, Op, Tag};
use crate::rewrite::{rewrite_default, RewritePass, Rewriter};

/// One pending `push_stack(v)` not yet proven observed. A persistent
/// singly-linked list (`Rc`-shared tail) rather than a mutable `Vec`: each
/// branch of a `match`/`if` needs its own view of the stack as it stood at
/// the branch point, and an `Rc` link lets siblings share that history
/// without cloning it.
struct StackFrame {
    prev: Option<Rc<StackFrame>>,
    value: NodeId,
    leaks: std::cell::Cell<bool>,
}

type StackState = Option<Rc<StackFrame>>;

fn mark_leaking(state: &StackState) {
    let mut cur = state.clone();
    while let Some(frame) = cur {
        frame.leaks.set(true);
        cur = frame.prev.clone();
    }
}

pub fn optimize_stack(_config: Config, src: &IrArena, dst: &mut IrArena, root: NodeId) -> Result<NodeId> {
    log::debug!("optimizing stack for {:?}", root);
    let mut rw = Rewriter::new_importer(src, dst);
    let mut pass = StackOptPass { state: None };
    rw.rewrite_node(&mut pass, root)
}

struct StackOptPass {
    state: StackState,
}

impl RewritePass for StackOptPass {
    fn rewrite(&mut self, rw: &mut Rewriter, old: NodeId) -> Result<NodeId> {
        match rw.src.get(old) {
            Node::Function(_) => {
                // Function boundaries reset the abstract stack.
                let saved = std::mem::take(&mut self.state);
                let result = rewrite_default(self, rw, old);
                self.state = saved;
                result
            }
            Node::Let(p) => {
                let p = p.clone();
                self.rewrite_let(rw, old, &p)
            }
            _ => {
                // A non-`Let` terminator (other than `Unreachable`) ends a
                // straight-line run; conservatively treat it as leaking and
                // start any nested bodies fresh.
                let tag = rw.src.get(old).tag();
                if tag != Tag::Unreachable {
                    mark_leaking(&self.state);
                    self.state = None;
                }
                rewrite_default(self, rw, old)
            }
        }
    }
}

impl StackOptPass {
    fn rewrite_let(&mut self, rw: &mut Rewriter, old: NodeId, p: &LetPayload) -> Result<NodeId> {
        let instr = rw.src.get(p.instruction).clone();
        match instr {
            Node::PrimOp(op) if op.op == Op::PushStack => {
                let value_old = op.operands[0];
                let value_new = rw.rewrite_node(self, value_old)?;
                let frame = Rc::new(StackFrame {
                    prev: self.state.clone(),
                    value: value_new,
                    leaks: std::cell::Cell::new(false),
                });
                self.state = Some(frame.clone());
                let new_tail = rw.rewrite_node(self, p.tail)?;
                if frame.leaks.get() {
                    let push_instr = rw.dst.primop(Op::PushStack, nodes(vec![value_new]));
                    let vars = rw.rewrite_nodes(self, &p.vars)?;
                    Ok(rw.dst.let_(push_instr, vars, new_tail))
                } else {
                    // Elided: the frame was never observed. Nothing bound
                    // by this push can have been referenced either (that
                    // would require a matching pop, which would have
                    // consumed the frame), so just splice in the tail.
                    log::debug!("eliding unobserved push_stack of {:?}", value_new);
                    Ok(new_tail)
                }
            }
            Node::PrimOp(op) if op.op == Op::PopStack => {
                match self.state.clone() {
                    Some(frame) => {
                        log::debug!("eliding pop_stack, binding directly to {:?}", frame.value);
                        self.state = frame.prev.clone();
                        for &old_var in p.vars.iter() {
                            rw.register_processed(old_var, frame.value)?;
                        }
                        rw.rewrite_node(self, p.tail)
                    }
                    None => {
                        // No statically known frame (e.g. crossed a leaking
                        // call boundary): keep the pop as-is.
                        rewrite_default(self, rw, old)
                    }
                }
            }
            Node::LeafCall(_) | Node::IndirectCall(_) | Node::Match(_) | Node::Control(_) | Node::Loop(_) | Node::If(_) => {
                mark_leaking(&self.state);
                self.state = None;
                rewrite_default(self, rw, old)
            }
            _ => rewrite_default(self, rw, old),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_push_pop_collapses_to_direct_bind() {
        let mut src = IrArena::new(Config::default());
        let i32t = src.int32_type();
        let seven = src.int_literal(32, 7);
        let push = src.primop(Op::PushStack, nodes(vec![seven]));
        let pop = src.primop(Op::PopStack, nodes(vec![]));
        let x = src.fresh_variable(None, i32t);
        let ret = src.return_(nodes(vec![x]));
        let after_pop = src.let_(pop, nodes(vec![x]), ret);
        let body = src.let_(push, nodes(vec![]), after_pop);
        let f = src.begin_function(nodes(vec![]), nodes(vec![i32t]));
        src.set_function_body(f, body);

        let mut dst = IrArena::new(Config::default());
        let new_f = optimize_stack(Config::default(), &src, &mut dst, f).unwrap();
        let new_body = match dst.get(new_f) {
            Node::Function(p) => p.body.unwrap(),
            _ => panic!("expected function"),
        };
        match dst.get(new_body) {
            Node::Return(p) => assert_eq!(dst.get(p.values[0]), dst.get(seven_in(&dst))),
            other => panic!("expected return directly after elision, got {:?}", other),
        }
    }

    fn seven_in(dst: &IrArena) -> NodeId {
        for (i, n) in dst.nodes().iter().enumerate() {
            if let Node::IntLiteral { width: 32, bits: 7 } = n {
                return NodeId(i as u32);
            }
        }
        panic!("literal 7 missing from destination arena");
    }

    #[test]
    fn call_between_push_and_pop_preserves_both() {
        let mut src = IrArena::new(Config::default());
        let i32t = src.int32_type();
        let seven = src.int_literal(32, 7);
        let push = src.primop(Op::PushStack, nodes(vec![seven]));
        let callee = src.begin_function(nodes(vec![]), nodes(vec![]));
        let noop_body = src.return_(nodes(vec![]));
        src.set_function_body(callee, noop_body);
        let call = src.leaf_call(callee, nodes(vec![]));
        let discard = src.fresh_variable(None, i32t);
        let pop = src.primop(Op::PopStack, nodes(vec![]));
        let x = src.fresh_variable(None, i32t);
        let ret = src.return_(nodes(vec![x]));
        let after_pop = src.let_(pop, nodes(vec![x]), ret);
        let after_call = src.let_(call, nodes(vec![discard]), after_pop);
        let body = src.let_(push, nodes(vec![]), after_call);
        let outer = src.begin_function(nodes(vec![]), nodes(vec![i32t]));
        src.set_function_body(outer, body);

        let mut dst = IrArena::new(Config::default());
        let new_outer = optimize_stack(Config::default(), &src, &mut dst, outer).unwrap();
        let new_body = match dst.get(new_outer) {
            Node::Function(p) => p.body.unwrap(),
            _ => panic!("expected function"),
        };
        match dst.get(new_body) {
            Node::Let(p) => match dst.get(p.instruction) {
                Node::PrimOp(op) => assert_eq!(op.op, Op::PushStack, "push must survive when a call intervenes"),
                other => panic!("expected push_stack to survive, got {:?}", other),
            },
            other => panic!("expected let wrapping the preserved push, got {:?}", other),
        }
    }
}
