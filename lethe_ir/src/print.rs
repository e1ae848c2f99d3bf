use std::fmt::{Display, Formatter, Result};

use crate::*;

/*
 * Printing produces the same textual format that parse accepts.
 */
impl Display for Module {
    fn fmt(&self, f: &mut Formatter) -> Result {
        for (idx, routine) in self.routines.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", routine)?;
        }
        Ok(())
    }
}

impl Display for Routine {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "fn {}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.value_name(*param))?;
        }
        writeln!(f, ")")?;

        // The entry block has to come first in the text, since that's how the
        // parser finds it.
        let rest = (0..self.blocks.len())
            .map(BlockID::new)
            .filter(|id| Some(*id) != self.entry);
        for id in self.entry.into_iter().chain(rest) {
            write_block(self, id, f)?;
        }
        Ok(())
    }
}

fn write_block(routine: &Routine, id: BlockID, f: &mut Formatter) -> Result {
    let block = routine.get_block(id);
    writeln!(f, "{}:", block.name)?;
    for inst in block.insts.iter() {
        write!(f, "  ")?;
        write_inst(routine, inst, f)?;
        writeln!(f)?;
    }
    match &block.terminator {
        Terminator::Branch(targets) => {
            write!(f, "  br ")?;
            for (idx, target) in targets.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", routine.get_block(*target).name)?;
            }
            writeln!(f)
        }
        Terminator::Return(Some(value)) => {
            write!(f, "  ret ")?;
            write_operand(routine, value, f)?;
            writeln!(f)
        }
        Terminator::Return(None) => writeln!(f, "  ret"),
    }
}

pub fn write_inst<W: std::fmt::Write>(
    routine: &Routine,
    inst: &Instruction,
    w: &mut W,
) -> Result {
    match inst {
        Instruction::Load { result, location } => write!(
            w,
            "{} = load {}",
            routine.value_name(*result),
            routine.value_name(*location)
        ),
        Instruction::Store { location, value } => {
            write!(w, "store {}, ", routine.value_name(*location))?;
            write_operand(routine, value, w)
        }
        Instruction::Other {
            result,
            opcode,
            args,
        } => {
            if let Some(result) = result {
                write!(w, "{} = ", routine.value_name(*result))?;
            }
            write!(w, "{}", opcode)?;
            for (idx, arg) in args.iter().enumerate() {
                write!(w, "{}", if idx == 0 { " " } else { ", " })?;
                write_operand(routine, arg, w)?;
            }
            Ok(())
        }
    }
}

pub fn write_operand<W: std::fmt::Write>(
    routine: &Routine,
    operand: &Operand,
    w: &mut W,
) -> Result {
    match operand {
        Operand::Value(id) => write!(w, "{}", routine.value_name(*id)),
        Operand::Integer(x) => write!(w, "{}", x),
        // Debug formatting always has a decimal point or an exponent, so
        // floats parse back as floats.
        Operand::Float(x) => write!(w, "{:?}", x.into_inner()),
    }
}
