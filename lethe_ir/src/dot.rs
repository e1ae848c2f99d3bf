use std::collections::HashSet;
use std::fmt::Write;

use crate::*;

/*
 * Write a module as a Graphviz digraph. Each routine is a cluster, each block
 * is a node listing its instructions, and each control flow edge is an edge.
 * If dead stores are given (one list per routine), they are drawn in red.
 */
pub fn write_dot<W: std::fmt::Write>(
    module: &Module,
    dead_stores: Option<&[Vec<InstID>]>,
    w: &mut W,
) -> std::fmt::Result {
    write!(w, "digraph \"Module\" {{\n")?;
    write!(w, "compound=true\n")?;
    for (idx, routine) in module.routines.iter().enumerate() {
        let dead: HashSet<InstID> = dead_stores
            .and_then(|dead_stores| dead_stores.get(idx))
            .map(|dead| dead.iter().copied().collect())
            .unwrap_or_default();
        write_routine(idx, routine, &dead, w)?;
    }
    write!(w, "}}\n")?;
    Ok(())
}

fn write_routine<W: std::fmt::Write>(
    i: usize,
    routine: &Routine,
    dead: &HashSet<InstID>,
    w: &mut W,
) -> std::fmt::Result {
    write!(w, "subgraph cluster_{} {{\n", i)?;
    write!(w, "label=\"{}\"\n", routine.name)?;
    write!(w, "bgcolor=ivory4\n")?;
    write!(w, "node [shape=box, style=filled, fillcolor=white]\n")?;
    for (j, block) in routine.blocks.iter().enumerate() {
        let id = BlockID::new(j);
        let mut label = String::new();
        write!(label, "<b>{}</b>", escape(&block.name))?;
        if Some(id) == routine.entry {
            write!(label, " (entry)")?;
        }
        write!(label, "<br align=\"left\"/>")?;
        for (k, inst) in block.insts.iter().enumerate() {
            let mut text = String::new();
            write_inst(routine, inst, &mut text)?;
            if dead.contains(&InstID::new(id, k)) {
                write!(
                    label,
                    "<font color=\"red\">{}</font><br align=\"left\"/>",
                    escape(&text)
                )?;
            } else {
                write!(label, "{}<br align=\"left\"/>", escape(&text))?;
            }
        }
        write!(
            label,
            "{}<br align=\"left\"/>",
            if block.terminator.is_return() {
                "ret"
            } else {
                "br"
            }
        )?;
        write!(w, "block_{}_{} [label=<{}>];\n", i, j, label)?;
    }
    for (j, block) in routine.blocks.iter().enumerate() {
        for (idx, succ) in block.terminator.successors().iter().enumerate() {
            write!(
                w,
                "block_{}_{} -> block_{}_{} [label=\"{}\"];\n",
                i,
                j,
                i,
                succ.idx(),
                idx
            )?;
        }
    }
    write!(w, "}}\n")?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
