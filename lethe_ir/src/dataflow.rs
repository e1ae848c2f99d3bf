extern crate bitvec;
extern crate log;

use bitvec::prelude::*;

use crate::*;

/*
 * Trait for a type that is a semilattice. Semilattice types must also be Eq,
 * so that the dataflow analysis can determine when to terminate.
 */
pub trait Semilattice: Eq + Clone {
    fn meet(a: &Self, b: &Self) -> Self;
}

/*
 * Compute the postorder of the blocks reachable from the entry block. A block
 * is pushed only after all of its unvisited successors have been fully
 * explored, and successors are explored in terminator order. Blocks are
 * marked visited before their successors are explored, so cycles terminate.
 * This uses an explicit stack rather than recursion, so very deep graphs
 * don't overflow the call stack, but the order is the same one a recursive
 * DFS would produce.
 */
pub fn postorder(routine: &Routine) -> LetheResult<Vec<BlockID>> {
    let entry = match routine.entry {
        Some(entry) if entry.idx() < routine.blocks.len() => entry,
        Some(entry) => Err(LetheError::InvalidInput(format!(
            "Entry block {} of routine {} doesn't exist.",
            entry.idx(),
            routine.name
        )))?,
        None => Err(LetheError::InvalidInput(format!(
            "Routine {} has no entry block.",
            routine.name
        )))?,
    };

    // Initialize order vector and bitset for tracking which blocks have been
    // visited.
    let mut order = Vec::with_capacity(routine.blocks.len());
    let mut visited = bitvec![u8, Lsb0; 0; routine.blocks.len()];

    // Each stack entry is a block, and the index of its next successor to
    // explore.
    let mut stack = vec![(entry, 0)];
    visited.set(entry.idx(), true);
    while let Some(top) = stack.last_mut() {
        let (block, next) = *top;
        if let Some(succ) = routine.successors(block).get(next) {
            top.1 += 1;
            if !visited[succ.idx()] {
                visited.set(succ.idx(), true);
                stack.push((*succ, 0));
            }
        } else {
            // After iterating successors, push this block.
            order.push(block);
            stack.pop();
        }
    }

    Ok(order)
}

/*
 * Result of a backward dataflow analysis. States are stored densely, indexed
 * by each block's position in the postorder the analysis was run over. Blocks
 * that weren't in that order (unreachable blocks) have no states at all.
 */
#[derive(Debug, Clone)]
pub struct BackwardSolution<L> {
    order: Vec<BlockID>,
    numbers: Vec<Option<u32>>,
    ins: Vec<L>,
    outs: Vec<L>,
    sweeps: usize,
}

impl<L> BackwardSolution<L> {
    pub fn order(&self) -> &[BlockID] {
        &self.order
    }

    pub fn number(&self, block: BlockID) -> Option<usize> {
        self.numbers
            .get(block.idx())
            .copied()
            .flatten()
            .map(|number| number as usize)
    }

    /*
     * State at the entry of a block.
     */
    pub fn get_in(&self, block: BlockID) -> Option<&L> {
        self.number(block).map(|number| &self.ins[number])
    }

    /*
     * State at the exit of a block.
     */
    pub fn get_out(&self, block: BlockID) -> Option<&L> {
        self.number(block).map(|number| &self.outs[number])
    }

    /*
     * Number of full sweeps over the order, including the last sweep that
     * observed no change.
     */
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }
}

/*
 * Top level backward dataflow function. The "out" state of a block is the meet
 * of the "in" states of its successors, starting from bottom (so a block with
 * no successors has a bottom "out" state). The flow function computes a
 * block's "in" state from its "out" state. Full sweeps over the given order are
 * repeated until a sweep doesn't change any state. Running over a postorder
 * makes this converge quickly, but any order reaches the same fixed point.
 *
 * The analysis always terminates for a monotone flow function over a finite
 * lattice. A sweep limit may still be given, in which case running out of
 * sweeps before reaching the fixed point is an error.
 */
pub fn backward_dataflow<L, F>(
    routine: &Routine,
    order: &[BlockID],
    bottom: L,
    sweep_limit: Option<usize>,
    mut flow_function: F,
) -> LetheResult<BackwardSolution<L>>
where
    L: Semilattice,
    F: FnMut(&L, BlockID) -> L,
{
    // Step 1: number blocks by their position in the order.
    let mut numbers = vec![None; routine.blocks.len()];
    for (number, block) in order.iter().enumerate() {
        numbers[block.idx()] = Some(number as u32);
    }

    // Step 2: look up the numbers of each block's successors. Every successor
    // of a block in the order must itself be in the order, which holds for
    // any order produced by postorder.
    let succ_numbers = order
        .iter()
        .map(|block| {
            routine
                .successors(*block)
                .iter()
                .map(|succ| {
                    numbers[succ.idx()].map(|number| number as usize).ok_or_else(|| {
                        LetheError::InvalidInput(format!(
                            "Successor {} of block {} in routine {} wasn't visited.",
                            routine.get_block(*succ).name,
                            routine.get_block(*block).name,
                            routine.name
                        ))
                    })
                })
                .collect::<LetheResult<Vec<usize>>>()
        })
        .collect::<LetheResult<Vec<_>>>()?;

    // Step 3: create initial "in" and "out" states.
    let mut ins = vec![bottom.clone(); order.len()];
    let mut outs = vec![bottom.clone(); order.len()];

    // Step 4: perform main dataflow loop.
    let mut sweeps = 0;
    loop {
        let mut change = false;
        sweeps += 1;

        for (number, block) in order.iter().enumerate() {
            // Compute new "out" value from successor "in" values.
            let mut new_out = bottom.clone();
            for succ_number in succ_numbers[number].iter() {
                new_out = L::meet(&new_out, &ins[*succ_number]);
            }
            if outs[number] != new_out {
                change = true;
                outs[number] = new_out;
            }

            // Compute new "in" value from the (possibly updated) "out" value.
            let new_in = flow_function(&outs[number], *block);
            if ins[number] != new_in {
                change = true;
                ins[number] = new_in;
            }
        }
        log::trace!(
            "backward dataflow over {}: sweep {} {}",
            routine.name,
            sweeps,
            if change { "changed" } else { "converged" }
        );

        // If no lattice value changed, we've reached the fixed point solution,
        // and can terminate.
        if !change {
            break;
        }
        if sweep_limit.map_or(false, |limit| sweeps >= limit) {
            Err(LetheError::SweepLimitExceeded {
                routine: routine.name.clone(),
                sweeps,
            })?;
        }
    }

    // Step 5: return solution.
    Ok(BackwardSolution {
        order: order.to_vec(),
        numbers,
        ins,
        outs,
        sweeps,
    })
}
