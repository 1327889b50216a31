//! The block builder (C3): a scoped, single-use accumulator that turns a
//! sequence of `append`/`gen_primop` calls into one immutable [`Block`].
use crate::arena::IrArena;
use crate::node::{nodes, Node, NodeId, Nodes, Op};

enum Entry {
    /// A non-binding instruction, pushed verbatim into the flat instruction
    /// list. Cannot appear in tail position (see §3.1): it stays outside
    /// the `Let` chain entirely.
    Plain(NodeId),
    /// A primop awaiting the terminator so its `Let.tail` can be wired to
    /// whatever follows it (the next chain entry, or the terminator).
    Primop { instruction: NodeId, variables: Vec<NodeId> },
}

/// Accumulates a [`Block`]'s instruction list and terminator. Single-use:
/// [`BlockBuilder::finish`] consumes `self`, so the type system rejects a
/// second call outright (§9 "Block builder as scoped resource").
pub struct BlockBuilder {
    entries: Vec<Entry>,
}

pub fn begin_block(_arena: &IrArena) -> BlockBuilder {
    BlockBuilder { entries: Vec::new() }
}

impl BlockBuilder {
    /// Push a non-binding instruction; order relative to other calls is
    /// preserved.
    pub fn append(&mut self, instruction: NodeId) {
        self.entries.push(Entry::Plain(instruction));
    }

    /// Append a primop producing one value per entry of `result_types`,
    /// returning the fresh bound variables in order.
    pub fn gen_primop(&mut self, arena: &mut IrArena, op: Op, operands: Nodes, result_types: &[NodeId]) -> Nodes {
        let instruction = arena.primop(op, operands);
        let variables: Vec<NodeId> = result_types
            .iter()
            .map(|&ty| arena.fresh_variable(None, ty))
            .collect();
        let result = nodes(variables.clone());
        self.entries.push(Entry::Primop { instruction, variables });
        result
    }

    /// Close the builder, wiring each buffered primop's `Let.tail` to
    /// whatever chain-shaped node follows it (the next primop's `Let`, or
    /// `terminator` if none remain), per §3.1.
    pub fn finish(self, arena: &mut IrArena, terminator: NodeId) -> NodeId {
        let mut accumulator = terminator;
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in self.entries.into_iter().rev() {
            match entry {
                Entry::Plain(id) => out.push(id),
                Entry::Primop { instruction, variables } => {
                    let let_id = arena.let_(instruction, nodes(variables), accumulator);
                    accumulator = let_id;
                    out.push(let_id);
                }
            }
        }
        out.reverse();
        arena.block(nodes(out), terminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::node::nodes;

    #[test]
    fn single_primop_chains_into_terminator() {
        let mut arena = IrArena::new(Config::default());
        let i32t = arena.int32_type();
        let one = arena.int_literal(32, 1);
        let two = arena.int_literal(32, 2);
        let mut bb = begin_block(&arena);
        let result = bb.gen_primop(&mut arena, Op::Add, nodes(vec![one, two]), &[i32t]);
        let ret = arena.return_(result.clone());
        let block = bb.finish(&mut arena, ret);
        match arena.get(block) {
            Node::Block(payload) => {
                assert_eq!(payload.instructions.len(), 1);
                assert_eq!(payload.terminator, ret);
                match arena.get(payload.instructions[0]) {
                    Node::Let(let_payload) => assert_eq!(let_payload.tail, ret),
                    _ => panic!("expected let"),
                }
            }
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn two_primops_chain_to_each_other_then_terminator() {
        let mut arena = IrArena::new(Config::default());
        let i32t = arena.int32_type();
        let one = arena.int_literal(32, 1);
        let mut bb = begin_block(&arena);
        let a = bb.gen_primop(&mut arena, Op::Add, nodes(vec![one, one]), &[i32t]);
        let b = bb.gen_primop(&mut arena, Op::Add, nodes(vec![a[0], one]), &[i32t]);
        let ret = arena.return_(b.clone());
        let block = bb.finish(&mut arena, ret);
        match arena.get(block) {
            Node::Block(payload) => {
                assert_eq!(payload.instructions.len(), 2);
                let first = match arena.get(payload.instructions[0]) {
                    Node::Let(l) => l.tail,
                    _ => panic!("expected let"),
                };
                assert_eq!(first, payload.instructions[1]);
            }
            _ => panic!("expected block"),
        }
    }
}
