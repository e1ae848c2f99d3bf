use std::collections::HashMap;

use crate::*;

/*
 * The builder provides a clean API for programatically creating routines. The
 * main function of the builder is to intern value names and block names, so
 * that identity of a name is identity of its ID.
 */
#[derive(Debug, Default)]
pub struct Builder {
    // Intern value names and block names.
    value_ids: HashMap<String, ValueID>,
    block_ids: HashMap<String, BlockID>,

    // The routine being built.
    routine: Routine,
}

/*
 * The IR builder may return errors when used incorrectly.
 */
type BuilderResult<T> = Result<T, LetheError>;

impl Builder {
    pub fn create(name: &str) -> Self {
        let mut builder = Self::default();
        builder.routine.name = String::from(name);
        builder
    }

    /*
     * Get the ID of a named value, creating it if this is the first time the
     * name is seen.
     */
    pub fn value(&mut self, name: &str) -> ValueID {
        if let Some(id) = self.value_ids.get(name) {
            *id
        } else {
            let id = ValueID::new(self.routine.values.len());
            self.value_ids.insert(String::from(name), id);
            self.routine.values.push(String::from(name));
            id
        }
    }

    pub fn add_param(&mut self, name: &str) -> ValueID {
        let id = self.value(name);
        self.routine.params.push(id);
        id
    }

    /*
     * Get the ID of a block by name, creating an empty block ending in a return
     * if this is the first time the name is seen. The first block created
     * becomes the entry block, unless the entry is set explicitly.
     */
    pub fn block(&mut self, name: &str) -> BlockID {
        if let Some(id) = self.block_ids.get(name) {
            *id
        } else {
            let id = BlockID::new(self.routine.blocks.len());
            self.block_ids.insert(String::from(name), id);
            self.routine.blocks.push(Block {
                name: String::from(name),
                insts: vec![],
                terminator: Terminator::default(),
            });
            if self.routine.entry.is_none() {
                self.routine.entry = Some(id);
            }
            id
        }
    }

    pub fn get_block_id(&self, name: &str) -> Option<BlockID> {
        self.block_ids.get(name).copied()
    }

    pub fn set_entry(&mut self, entry: Option<BlockID>) {
        self.routine.entry = entry;
    }

    pub fn push_load(&mut self, block: BlockID, result: ValueID, location: ValueID) -> InstID {
        self.push(block, Instruction::Load { result, location })
    }

    pub fn push_store(&mut self, block: BlockID, location: ValueID, value: Operand) -> InstID {
        self.push(block, Instruction::Store { location, value })
    }

    pub fn push_other(
        &mut self,
        block: BlockID,
        result: Option<ValueID>,
        opcode: &str,
        args: Box<[Operand]>,
    ) -> InstID {
        self.push(
            block,
            Instruction::Other {
                result,
                opcode: String::from(opcode),
                args,
            },
        )
    }

    pub fn push(&mut self, block: BlockID, inst: Instruction) -> InstID {
        let insts = &mut self.routine.blocks[block.idx()].insts;
        insts.push(inst);
        InstID::new(block, insts.len() - 1)
    }

    pub fn set_branch(&mut self, block: BlockID, targets: Box<[BlockID]>) -> BuilderResult<()> {
        if targets.is_empty() {
            Err(LetheError::InvalidInput(format!(
                "Branch at the end of block {} must have at least one target.",
                self.routine.blocks[block.idx()].name
            )))?;
        }
        self.routine.blocks[block.idx()].terminator = Terminator::Branch(targets);
        Ok(())
    }

    pub fn set_return(&mut self, block: BlockID, value: Option<Operand>) {
        self.routine.blocks[block.idx()].terminator = Terminator::Return(value);
    }

    pub fn finish(self) -> Routine {
        self.routine
    }
}
