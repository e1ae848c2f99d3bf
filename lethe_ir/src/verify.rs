use crate::*;

/*
 * Top level IR verification function. Checks the structural properties every
 * analysis assumes, and returns the first problem found.
 */
pub fn verify(module: &Module) -> LetheResult<()> {
    for routine in module.routines.iter() {
        verify_routine(routine)?;
    }
    Ok(())
}

pub fn verify_routine(routine: &Routine) -> LetheResult<()> {
    let invalid = |msg: String| -> LetheResult<()> {
        Err(LetheError::InvalidInput(format!(
            "Routine {}: {}",
            routine.name, msg
        )))
    };

    // Every routine needs an entry block, and it must exist.
    match routine.entry {
        None => invalid(String::from("no entry block."))?,
        Some(entry) if entry.idx() >= routine.blocks.len() => {
            invalid(format!("entry block {} doesn't exist.", entry.idx()))?
        }
        _ => {}
    }

    let check_value = |id: ValueID| -> LetheResult<()> {
        if id.idx() >= routine.values.len() {
            invalid(format!("value {} doesn't exist.", id.idx()))
        } else {
            Ok(())
        }
    };
    let check_operand = |operand: &Operand| -> LetheResult<()> {
        if let Operand::Value(id) = operand {
            check_value(*id)
        } else {
            Ok(())
        }
    };

    for param in routine.params.iter() {
        check_value(*param)?;
    }

    for block in routine.blocks.iter() {
        for inst in block.insts.iter() {
            match inst {
                Instruction::Load { result, location } => {
                    check_value(*result)?;
                    check_value(*location)?;
                }
                Instruction::Store { location, value } => {
                    check_value(*location)?;
                    check_operand(value)?;
                }
                Instruction::Other {
                    result,
                    opcode,
                    args,
                } => {
                    if let Some(result) = result {
                        check_value(*result)?;
                    }
                    if opcode.is_empty() {
                        invalid(format!("empty opcode in block {}.", block.name))?;
                    }
                    for arg in args.iter() {
                        check_operand(arg)?;
                    }
                }
            }
        }

        match &block.terminator {
            Terminator::Branch(targets) => {
                if targets.is_empty() {
                    invalid(format!("branch in block {} has no targets.", block.name))?;
                }
                for target in targets.iter() {
                    if target.idx() >= routine.blocks.len() {
                        invalid(format!(
                            "block {} branches to non-existent block {}.",
                            block.name,
                            target.idx()
                        ))?;
                    }
                }
            }
            Terminator::Return(Some(value)) => check_operand(value)?,
            Terminator::Return(None) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_modules_verify() {
        let module = parse(
            "
fn f(p)
entry:
  store p, 1
  v = load p
  br exit
exit:
  ret v
",
        )
        .unwrap();
        assert_eq!(verify(&module), Ok(()));
    }

    #[test]
    fn missing_entry() {
        let module = parse("fn f()\n").unwrap();
        assert!(matches!(verify(&module), Err(LetheError::InvalidInput(_))));
    }

    #[test]
    fn dangling_references() {
        let mut routine = parse("fn f()\nentry:\n  store x, 1\n")
            .unwrap()
            .routines
            .remove(0);
        routine.blocks[0].terminator = Terminator::Branch(Box::new([BlockID::new(3)]));
        assert!(verify_routine(&routine).is_err());

        routine.blocks[0].terminator = Terminator::Return(None);
        routine.blocks[0].insts.push(Instruction::Load {
            result: ValueID::new(0),
            location: ValueID::new(9),
        });
        assert!(verify_routine(&routine).is_err());

        routine.blocks[0].insts.pop();
        routine.entry = Some(BlockID::new(1));
        assert!(verify_routine(&routine).is_err());
    }
}
