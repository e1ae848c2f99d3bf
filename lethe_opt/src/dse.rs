extern crate lethe_ir;
extern crate log;

use self::lethe_ir::*;

/*
 * Top level function to run dead store elimination on a routine. Computes the
 * postorder and the liveness of memory locations, then removes every store to
 * a location that isn't live right after the store. Returns whether any store
 * was removed.
 */
pub fn dse(routine: &mut Routine, sweep_limit: Option<usize>) -> LetheResult<bool> {
    let order = postorder(routine)?;
    let liveness = liveness(routine, &order, sweep_limit)?;
    Ok(dse_with_liveness(routine, &liveness) > 0)
}

/*
 * Run detection and elimination against an already computed liveness of the
 * routine. Returns the number of stores removed. The liveness is stale
 * afterwards if anything was removed.
 */
pub fn dse_with_liveness(routine: &mut Routine, liveness: &Liveness) -> usize {
    let dead = find_dead_stores(routine, liveness);
    log::info!(
        "dse: {} dead store(s) in {} after {} liveness sweep(s)",
        dead.len(),
        routine.name,
        liveness.sweeps()
    );
    eliminate_dead_stores(routine, &dead);
    dead.len()
}

/*
 * Find dead stores, given the converged liveness of a routine. Each block is
 * scanned once, from last instruction to first, starting from a private copy
 * of the block's exit state. A load makes its location live. A store to a live
 * location satisfies the pending read, so it's needed, and the location stops
 * being live above it. A store to a location that isn't live is dead.
 *
 * Blocks are scanned in the analysis' order (only reachable blocks are in it),
 * and stores within a block are reported last to first.
 */
pub fn find_dead_stores(routine: &Routine, liveness: &Liveness) -> Vec<InstID> {
    let mut dead = vec![];
    for block_id in liveness.order() {
        let mut live = match liveness.get_out(*block_id) {
            Some(out) => out.clone(),
            None => continue,
        };

        let block = routine.get_block(*block_id);
        for (idx, inst) in block.insts.iter().enumerate().rev() {
            match inst {
                Instruction::Load {
                    result: _,
                    location,
                } => live.insert(*location),
                Instruction::Store { location, value: _ } => {
                    if !live.remove(*location) {
                        let id = InstID::new(*block_id, idx);
                        if log::log_enabled!(log::Level::Debug) {
                            let mut text = String::new();
                            if write_inst(routine, inst, &mut text).is_ok() {
                                log::debug!(
                                    "dse: {} in block {} of {} is dead",
                                    text,
                                    block.name,
                                    routine.name
                                );
                            }
                        }
                        dead.push(id);
                    }
                }
                Instruction::Other { .. } => {}
            }
        }
    }
    dead
}

/*
 * Remove dead stores from their blocks. Returns whether anything was removed,
 * which callers use to decide whether analyses of the routine are stale.
 */
pub fn eliminate_dead_stores(routine: &mut Routine, dead: &[InstID]) -> bool {
    debug_assert!(dead.iter().all(|id| routine.get_inst(*id).is_store()));
    routine.remove_instructions(dead);
    !dead.is_empty()
}
