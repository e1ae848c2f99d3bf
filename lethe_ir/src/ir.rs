extern crate ordered_float;

/*
 * A module is the unit of parsing and printing. Routines inside a module are
 * completely independent of each other - there is no interprocedural
 * information kept in the IR.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub routines: Vec<Routine>,
}

/*
 * A routine is a control flow graph of basic blocks. Blocks are stored in an
 * arena and referenced by BlockID. Named values (parameters, results of
 * instructions, and any identifier used as a memory location) are interned
 * per routine, so that two references to the same name always get the same
 * ValueID. The entry block is optional only so that malformed routines can be
 * represented and rejected by the verifier.
 */
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Routine {
    pub name: String,
    pub params: Vec<ValueID>,
    pub values: Vec<String>,
    pub blocks: Vec<Block>,
    pub entry: Option<BlockID>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub insts: Vec<Instruction>,
    pub terminator: Terminator,
}

/*
 * Only loads and stores take part in dead store elimination. Everything else
 * (calls, arithmetic, volatile or atomic accesses) is an opaque Other, which
 * neither reads nor writes any tracked location as far as the analysis is
 * concerned.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    Load {
        result: ValueID,
        location: ValueID,
    },
    Store {
        location: ValueID,
        value: Operand,
    },
    Other {
        result: Option<ValueID>,
        opcode: String,
        args: Box<[Operand]>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Terminator {
    Branch(Box<[BlockID]>),
    Return(Option<Operand>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Value(ValueID),
    Integer(i64),
    Float(ordered_float::OrderedFloat<f64>),
}

impl Module {
    pub fn get_routine(&self, name: &str) -> Option<&Routine> {
        self.routines.iter().find(|routine| routine.name == name)
    }
}

impl Routine {
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn value_name(&self, id: ValueID) -> &str {
        &self.values[id.idx()]
    }

    pub fn get_block(&self, id: BlockID) -> &Block {
        &self.blocks[id.idx()]
    }

    pub fn get_inst(&self, id: InstID) -> &Instruction {
        &self.blocks[id.block().idx()].insts[id.idx()]
    }

    pub fn successors(&self, id: BlockID) -> &[BlockID] {
        self.blocks[id.idx()].terminator.successors()
    }

    /*
     * Predecessors aren't stored, since nothing in the core needs them. This
     * inverts the successor relation when a caller does.
     */
    pub fn predecessors(&self) -> Vec<Vec<BlockID>> {
        let mut preds = vec![vec![]; self.blocks.len()];
        for (idx, block) in self.blocks.iter().enumerate() {
            for succ in block.terminator.successors() {
                preds[succ.idx()].push(BlockID::new(idx));
            }
        }
        preds
    }

    pub fn num_insts(&self) -> usize {
        self.blocks.iter().map(|block| block.insts.len()).sum()
    }

    /*
     * Detach a set of instructions from their blocks. Instruction IDs refer to
     * the layout before any removal, so the order of the input doesn't matter,
     * and duplicates are harmless.
     */
    pub fn remove_instructions(&mut self, ids: &[InstID]) {
        let mut doomed: Vec<Vec<usize>> = vec![vec![]; self.blocks.len()];
        for id in ids {
            doomed[id.block().idx()].push(id.idx());
        }

        for (block, mut indices) in self.blocks.iter_mut().zip(doomed) {
            if indices.is_empty() {
                continue;
            }
            indices.sort_unstable();
            indices.dedup();
            let mut next = 0;
            let mut position = 0;
            block.insts.retain(|_| {
                let keep = indices.get(next) != Some(&position);
                if !keep {
                    next += 1;
                }
                position += 1;
                keep
            });
        }
    }
}

impl Instruction {
    pub fn is_load(&self) -> bool {
        matches!(self, Instruction::Load { .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Instruction::Store { .. })
    }

    /*
     * The memory location an instruction reads or writes, if it's one the
     * analysis tracks.
     */
    pub fn location(&self) -> Option<ValueID> {
        match self {
            Instruction::Load {
                result: _,
                location,
            } => Some(*location),
            Instruction::Store { location, value: _ } => Some(*location),
            Instruction::Other { .. } => None,
        }
    }

    pub fn result(&self) -> Option<ValueID> {
        match self {
            Instruction::Load {
                result,
                location: _,
            } => Some(*result),
            Instruction::Store {
                location: _,
                value: _,
            } => None,
            Instruction::Other { result, .. } => *result,
        }
    }

    pub fn lower_case_name(&self) -> &str {
        match self {
            Instruction::Load { .. } => "load",
            Instruction::Store { .. } => "store",
            Instruction::Other { opcode, .. } => opcode,
        }
    }
}

impl Terminator {
    pub fn successors(&self) -> &[BlockID] {
        match self {
            Terminator::Branch(targets) => targets,
            Terminator::Return(_) => &[],
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Terminator::Return(_))
    }
}

impl Default for Terminator {
    fn default() -> Self {
        Terminator::Return(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockID(u32);

impl BlockID {
    pub fn new(x: usize) -> Self {
        BlockID(x as u32)
    }

    pub fn idx(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueID(u32);

impl ValueID {
    pub fn new(x: usize) -> Self {
        ValueID(x as u32)
    }

    pub fn idx(&self) -> usize {
        self.0 as usize
    }
}

/*
 * Instructions are identified by their block and their position inside that
 * block. These are only stable until the routine is next modified.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstID(BlockID, u32);

impl InstID {
    pub fn new(block: BlockID, x: usize) -> Self {
        InstID(block, x as u32)
    }

    pub fn block(&self) -> BlockID {
        self.0
    }

    pub fn idx(&self) -> usize {
        self.1 as usize
    }
}
