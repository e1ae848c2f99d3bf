extern crate bitvec;

use bitvec::prelude::*;

use crate::*;

/*
 * A set of memory locations that may be read before they're next written. The
 * set is a bit vector over the routine's values, since any value may be used
 * as a location. Two live sets are only comparable if they were created for
 * the same routine.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSet {
    bits: BitVec<u8, Lsb0>,
}

impl LiveSet {
    pub fn new(num_values: usize) -> Self {
        LiveSet {
            bits: bitvec![u8, Lsb0; 0; num_values],
        }
    }

    pub fn insert(&mut self, id: ValueID) {
        self.bits.set(id.idx(), true);
    }

    /*
     * Returns whether the location was live before removing it.
     */
    pub fn remove(&mut self, id: ValueID) -> bool {
        self.bits.replace(id.idx(), false)
    }

    pub fn contains(&self, id: ValueID) -> bool {
        self.bits[id.idx()]
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueID> + '_ {
        self.bits.iter_ones().map(ValueID::new)
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }
}

impl Semilattice for LiveSet {
    fn meet(a: &Self, b: &Self) -> Self {
        assert!(
            a.bits.len() == b.bits.len(),
            "LiveSets must have same length to meet."
        );
        LiveSet {
            bits: a.bits.clone() | &b.bits,
        }
    }
}

pub type Liveness = BackwardSolution<LiveSet>;

/*
 * Compute the locations live at the entry and exit of every reachable block.
 * The order is normally the postorder of the routine.
 */
pub fn liveness(
    routine: &Routine,
    order: &[BlockID],
    sweep_limit: Option<usize>,
) -> LetheResult<Liveness> {
    backward_dataflow(
        routine,
        order,
        LiveSet::new(routine.num_values()),
        sweep_limit,
        |out, id| liveness_flow(out, routine.get_block(id)),
    )
}

/*
 * Flow function for liveness of a whole block: scan instructions from last to
 * first, starting from the live set at the block's exit.
 */
pub fn liveness_flow(out: &LiveSet, block: &Block) -> LiveSet {
    let mut live = out.clone();
    for inst in block.insts.iter().rev() {
        liveness_transfer(&mut live, inst);
    }
    live
}

/*
 * A load makes its location live above it. A store satisfies any pending read
 * of its location, so the location isn't live above it. Nothing else touches
 * any tracked location.
 */
pub fn liveness_transfer(live: &mut LiveSet, inst: &Instruction) {
    match inst {
        Instruction::Load {
            result: _,
            location,
        } => live.insert(*location),
        Instruction::Store { location, value: _ } => {
            live.remove(*location);
        }
        Instruction::Other { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    extern crate rand;

    use self::rand::rngs::StdRng;
    use self::rand::{Rng, SeedableRng};

    use super::*;

    fn live_names(routine: &Routine, set: Option<&LiveSet>) -> Vec<String> {
        set.unwrap()
            .iter()
            .map(|id| String::from(routine.value_name(id)))
            .collect()
    }

    #[test]
    fn straight_line() {
        let module = parse(
            "
fn f()
entry:
  store x, 1
  store x, 2
  v = load x
  ret v
",
        )
        .unwrap();
        let routine = &module.routines[0];
        let order = postorder(routine).unwrap();
        let live = liveness(routine, &order, None).unwrap();
        assert!(live.get_out(BlockID::new(0)).unwrap().is_empty());
        assert!(live.get_in(BlockID::new(0)).unwrap().is_empty());
        assert_eq!(live.sweeps(), 1);
    }

    #[test]
    fn branch() {
        let module = parse(
            "
fn f()
entry:
  store x, 1
  br a, b
a:
  v = load x
  ret v
b:
  store x, 2
  ret
",
        )
        .unwrap();
        let routine = &module.routines[0];
        let order = postorder(routine).unwrap();
        let live = liveness(routine, &order, None).unwrap();
        assert_eq!(live_names(routine, live.get_out(BlockID::new(0))), vec!["x"]);
        assert!(live.get_in(BlockID::new(0)).unwrap().is_empty());
        assert_eq!(live_names(routine, live.get_in(BlockID::new(1))), vec!["x"]);
        assert!(live.get_in(BlockID::new(2)).unwrap().is_empty());
    }

    #[test]
    fn self_loop_needs_iteration() {
        let module = parse(
            "
fn f()
l:
  v = load x
  store x, 3
  br l
",
        )
        .unwrap();
        let routine = &module.routines[0];
        let order = postorder(routine).unwrap();
        let live = liveness(routine, &order, None).unwrap();
        assert_eq!(live_names(routine, live.get_out(BlockID::new(0))), vec!["x"]);
        assert_eq!(live_names(routine, live.get_in(BlockID::new(0))), vec!["x"]);

        // The first sweep only sees the load. The second sweep carries it
        // around the back edge, and the third confirms nothing changed.
        assert_eq!(live.sweeps(), 3);
        assert!(matches!(
            liveness(routine, &order, Some(2)),
            Err(LetheError::SweepLimitExceeded { sweeps: 2, .. })
        ));
        assert!(liveness(routine, &order, Some(3)).is_ok());
    }

    #[test]
    fn unreachable_blocks_have_no_state() {
        let module = parse(
            "
fn f()
entry:
  ret
orphan:
  v = load x
  br entry
",
        )
        .unwrap();
        let routine = &module.routines[0];
        let order = postorder(routine).unwrap();
        let live = liveness(routine, &order, None).unwrap();
        assert!(live.get_in(BlockID::new(1)).is_none());
        assert!(live.get_out(BlockID::new(1)).is_none());
        assert_eq!(live.order(), &[BlockID::new(0)]);
    }

    #[test]
    fn other_instructions_are_transparent() {
        let module = parse(
            "
fn f(p)
entry:
  store_volatile x, 1
  c = call g, x
  v = load_atomic x
  store p, 4
  br exit
exit:
  w = load x
  ret w
",
        )
        .unwrap();
        let routine = &module.routines[0];
        let order = postorder(routine).unwrap();
        let live = liveness(routine, &order, None).unwrap();
        assert_eq!(live_names(routine, live.get_in(BlockID::new(0))), vec!["x"]);
    }

    fn random_routine(rng: &mut StdRng) -> Routine {
        let mut builder = Builder::create("random");
        let num_blocks = rng.gen_range(1..10);
        let blocks: Vec<_> = (0..num_blocks)
            .map(|idx| builder.block(&format!("b{}", idx)))
            .collect();
        let locations: Vec<_> = ["x", "y", "z", "w"]
            .iter()
            .map(|name| builder.value(name))
            .collect();
        let result = builder.value("v");
        for block in blocks.iter() {
            for _ in 0..rng.gen_range(0..6) {
                let location = locations[rng.gen_range(0..locations.len())];
                if rng.gen_bool(0.5) {
                    builder.push_load(*block, result, location);
                } else {
                    builder.push_store(*block, location, Operand::Integer(1));
                }
            }
            let num_succs = rng.gen_range(0..3);
            if num_succs > 0 {
                let targets = (0..num_succs)
                    .map(|_| blocks[rng.gen_range(0..num_blocks)])
                    .collect();
                builder.set_branch(*block, targets).unwrap();
            }
        }
        builder.finish()
    }

    #[test]
    fn random_graphs_reach_fixed_point() {
        let mut rng = StdRng::seed_from_u64(0x1e7e);
        for _ in 0..500 {
            let routine = random_routine(&mut rng);
            let order = postorder(&routine).unwrap();
            let live = liveness(&routine, &order, None).unwrap();

            // Sweeps are bounded by the size of the lattice: every sweep but
            // the last two grows some "in" set.
            assert!(live.sweeps() <= routine.num_values() * order.len() + 2);

            // The dataflow equations hold at the fixed point.
            for block in order.iter() {
                let mut out = LiveSet::new(routine.num_values());
                for succ in routine.successors(*block) {
                    out = LiveSet::meet(&out, live.get_in(*succ).unwrap());
                }
                assert_eq!(live.get_out(*block), Some(&out));
                assert_eq!(
                    live.get_in(*block),
                    Some(&liveness_flow(&out, routine.get_block(*block)))
                );
            }
        }
    }
}
