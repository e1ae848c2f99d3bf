extern crate nom;

use std::collections::HashSet;

use crate::*;

/*
 * Top level parse function.
 */
pub fn parse(ir_text: &str) -> LetheResult<Module> {
    let (_, routines) = parse_module(ir_text).map_err(|err| match err {
        nom::Err::Error(err) | nom::Err::Failure(err) => LetheError::Parse(format!(
            "unexpected input at line {}: \"{}\"",
            line_number(ir_text, err.input),
            err.input.lines().next().unwrap_or("").trim()
        )),
        nom::Err::Incomplete(_) => LetheError::Parse(String::from("incomplete input")),
    })?;

    Ok(Module {
        routines: routines
            .into_iter()
            .map(build_routine)
            .collect::<LetheResult<_>>()?,
    })
}

fn line_number(ir_text: &str, rest: &str) -> usize {
    ir_text[..ir_text.len() - rest.len()].matches('\n').count() + 1
}

/*
 * The parser works in two phases. First, the text is parsed into statements
 * that still refer to blocks and values by name. Then, each routine is built
 * using the IR builder, which interns names. Splitting the phases lets block
 * IDs follow definition order, even when a branch refers to a block that's
 * defined later in the text.
 */
struct RawRoutine<'a> {
    name: &'a str,
    params: Vec<&'a str>,
    statements: Vec<(usize, Statement<'a>)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Statement<'a> {
    Label(&'a str),
    Load {
        result: &'a str,
        location: &'a str,
    },
    Store {
        location: &'a str,
        value: RawOperand<'a>,
    },
    Other {
        result: Option<&'a str>,
        opcode: &'a str,
        args: Vec<RawOperand<'a>>,
    },
    Branch(Vec<&'a str>),
    Return(Option<RawOperand<'a>>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RawOperand<'a> {
    Value(&'a str),
    Integer(i64),
    Float(f64),
}

fn build_routine(raw: RawRoutine) -> LetheResult<Routine> {
    let mut builder = Builder::create(raw.name);
    for param in raw.params.iter() {
        builder.add_param(param);
    }

    // Create every block up front, in definition order.
    let mut defined = HashSet::new();
    for (line, statement) in raw.statements.iter() {
        if let Statement::Label(label) = statement {
            if !defined.insert(*label) {
                Err(LetheError::Parse(format!(
                    "block {} in routine {} is defined twice (line {})",
                    label, raw.name, line
                )))?;
            }
            builder.block(label);
        }
    }

    let mut current: Option<BlockID> = None;
    let mut terminated = false;
    for (line, statement) in raw.statements {
        let block = match (&statement, current) {
            (Statement::Label(label), _) => {
                current = builder.get_block_id(label);
                terminated = false;
                continue;
            }
            (_, Some(block)) if !terminated => block,
            _ => Err(LetheError::Parse(format!(
                "statement at line {} in routine {} isn't inside a block",
                line, raw.name
            )))?,
        };

        let operand = |builder: &mut Builder, op: RawOperand| match op {
            RawOperand::Value(name) => Operand::Value(builder.value(name)),
            RawOperand::Integer(x) => Operand::Integer(x),
            RawOperand::Float(x) => Operand::Float(ordered_float::OrderedFloat(x)),
        };
        match statement {
            Statement::Label(_) => unreachable!(),
            Statement::Load { result, location } => {
                let result = builder.value(result);
                let location = builder.value(location);
                builder.push_load(block, result, location);
            }
            Statement::Store { location, value } => {
                let location = builder.value(location);
                let value = operand(&mut builder, value);
                builder.push_store(block, location, value);
            }
            Statement::Other {
                result,
                opcode,
                args,
            } => {
                let result = result.map(|result| builder.value(result));
                let args = args
                    .into_iter()
                    .map(|arg| operand(&mut builder, arg))
                    .collect();
                builder.push_other(block, result, opcode, args);
            }
            Statement::Branch(targets) => {
                let targets = targets
                    .into_iter()
                    .map(|target| {
                        builder.get_block_id(target).ok_or_else(|| {
                            LetheError::Parse(format!(
                                "branch at line {} in routine {} targets undefined block {}",
                                line, raw.name, target
                            ))
                        })
                    })
                    .collect::<LetheResult<_>>()?;
                builder.set_branch(block, targets)?;
                terminated = true;
            }
            Statement::Return(value) => {
                let value = value.map(|value| operand(&mut builder, value));
                builder.set_return(block, value);
                terminated = true;
            }
        }
    }

    Ok(builder.finish())
}

/*
 * A module is just a file with a list of routines.
 */
fn parse_module<'a>(ir_text: &'a str) -> nom::IResult<&'a str, Vec<RawRoutine<'a>>> {
    // If there is any text left after successfully parsing some routines,
    // treat that as an error.
    nom::combinator::all_consuming(nom::sequence::terminated(
        nom::multi::many0(|x| parse_routine(x, ir_text)),
        parse_space,
    ))(ir_text)
}

/*
 * A routine is a header of the form "fn name(a, b)", followed by a list of
 * statements, one per line.
 */
fn parse_routine<'a>(ir_text: &'a str, whole: &'a str) -> nom::IResult<&'a str, RawRoutine<'a>> {
    let ir_text = parse_space(ir_text)?.0;
    let ir_text = nom::bytes::complete::tag("fn")(ir_text)?.0;
    let ir_text = nom::character::complete::space1(ir_text)?.0;
    let (ir_text, name) = parse_identifier(ir_text)?;
    let ir_text = nom::character::complete::space0(ir_text)?.0;
    let ir_text = nom::character::complete::char('(')(ir_text)?.0;
    let (ir_text, params) = nom::multi::separated_list0(
        nom::character::complete::char(','),
        nom::sequence::delimited(
            nom::character::complete::space0,
            parse_identifier,
            nom::character::complete::space0,
        ),
    )(ir_text)?;
    let ir_text = nom::character::complete::char(')')(ir_text)?.0;
    let ir_text = parse_line_end(ir_text)?.0;

    // Statements run until the next routine header or the end of the text.
    let (ir_text, statements) = nom::multi::many0(
        |x: &'a str| -> nom::IResult<&'a str, (usize, Statement<'a>)> {
            let x = parse_space(x)?.0;
            let line = line_number(whole, x);
            let (x, statement) = parse_statement(x)?;
            Ok((x, (line, statement)))
        },
    )(ir_text)?;

    Ok((
        ir_text,
        RawRoutine {
            name,
            params,
            statements,
        },
    ))
}

/*
 * A statement is a block label ("name:"), an instruction with a result
 * ("name = opcode args"), or an instruction without one ("opcode args").
 * Each statement takes up exactly one line.
 */
fn parse_statement<'a>(ir_text: &'a str) -> nom::IResult<&'a str, Statement<'a>> {
    let (ir_text, first) = parse_identifier(ir_text)?;

    // "fn" starts the next routine, and is never a statement.
    if first == "fn" {
        return Err(nom::Err::Error(nom::error::Error {
            input: ir_text,
            code: nom::error::ErrorKind::Tag,
        }));
    }
    let ir_text = nom::character::complete::space0(ir_text)?.0;

    if let Ok((ir_text, _)) =
        nom::character::complete::char::<_, nom::error::Error<&str>>(':')(ir_text)
    {
        let ir_text = parse_line_end(ir_text)?.0;
        return Ok((ir_text, Statement::Label(first)));
    }

    let (ir_text, result, opcode) = if let Ok((ir_text, _)) =
        nom::character::complete::char::<_, nom::error::Error<&str>>('=')(ir_text)
    {
        let ir_text = nom::character::complete::space0(ir_text)?.0;
        let (ir_text, opcode) = parse_identifier(ir_text)?;
        (ir_text, Some(first), opcode)
    } else {
        (ir_text, None, first)
    };
    let ir_text = nom::character::complete::space0(ir_text)?.0;

    let (ir_text, statement) = match (result, opcode) {
        (Some(result), "load") => {
            let (ir_text, location) = parse_identifier(ir_text)?;
            (ir_text, Statement::Load { result, location })
        }
        (None, "store") => {
            let (ir_text, (location, value)) = nom::sequence::separated_pair(
                parse_identifier,
                parse_comma,
                parse_operand,
            )(ir_text)?;
            (ir_text, Statement::Store { location, value })
        }
        (None, "br") => {
            let (ir_text, targets) =
                nom::multi::separated_list1(parse_comma, parse_identifier)(ir_text)?;
            (ir_text, Statement::Branch(targets))
        }
        (None, "ret") => {
            let (ir_text, value) = nom::combinator::opt(parse_operand)(ir_text)?;
            (ir_text, Statement::Return(value))
        }
        // Loads must name their result, stores and terminators must not.
        // Anything else is malformed rather than an unknown instruction.
        (None, "load") | (Some(_), "store") | (Some(_), "br") | (Some(_), "ret") => {
            Err(nom::Err::Failure(nom::error::Error {
                input: ir_text,
                code: nom::error::ErrorKind::Verify,
            }))?
        }
        // Any other opcode is an instruction the analysis doesn't classify.
        (result, opcode) => {
            let (ir_text, args) =
                nom::multi::separated_list0(parse_comma, parse_operand)(ir_text)?;
            (
                ir_text,
                Statement::Other {
                    result,
                    opcode,
                    args,
                },
            )
        }
    };

    let ir_text = parse_line_end(ir_text)?.0;
    Ok((ir_text, statement))
}

fn parse_operand<'a>(ir_text: &'a str) -> nom::IResult<&'a str, RawOperand<'a>> {
    nom::branch::alt((parse_number, |x: &'a str| {
        parse_identifier(x).map(|(x, name)| (x, RawOperand::Value(name)))
    }))(ir_text)
}

fn parse_number<'a>(ir_text: &'a str) -> nom::IResult<&'a str, RawOperand<'a>> {
    let (rest, text) = nom::combinator::recognize(nom::sequence::tuple((
        nom::combinator::opt(nom::character::complete::char('-')),
        nom::character::complete::digit1,
        nom::combinator::opt(nom::sequence::pair(
            nom::character::complete::char('.'),
            nom::character::complete::digit1,
        )),
        nom::combinator::opt(nom::sequence::tuple((
            nom::character::complete::one_of("eE"),
            nom::combinator::opt(nom::character::complete::one_of("+-")),
            nom::character::complete::digit1,
        ))),
    )))(ir_text)?;
    let operand = if text.contains(['.', 'e', 'E']) {
        text.parse().ok().map(RawOperand::Float)
    } else {
        text.parse().ok().map(RawOperand::Integer)
    };
    match operand {
        Some(operand) => Ok((rest, operand)),
        None => Err(nom::Err::Failure(nom::error::Error {
            input: ir_text,
            code: nom::error::ErrorKind::Digit,
        })),
    }
}

fn parse_identifier<'a>(ir_text: &'a str) -> nom::IResult<&'a str, &'a str> {
    // Here's the set of characters that can be in an identifier. Must be non-
    // empty.
    nom::combinator::verify(
        nom::bytes::complete::is_a(
            "1234567890_@ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz",
        ),
        |s: &str| s.len() > 0,
    )(ir_text)
}

fn parse_comma<'a>(ir_text: &'a str) -> nom::IResult<&'a str, char> {
    nom::sequence::delimited(
        nom::character::complete::space0,
        nom::character::complete::char(','),
        nom::character::complete::space0,
    )(ir_text)
}

fn parse_comment<'a>(ir_text: &'a str) -> nom::IResult<&'a str, &'a str> {
    nom::sequence::preceded(
        nom::character::complete::char('#'),
        nom::bytes::complete::take_till(|c| c == '\n'),
    )(ir_text)
}

/*
 * Eat whitespace, newlines, and comments.
 */
fn parse_space<'a>(ir_text: &'a str) -> nom::IResult<&'a str, ()> {
    let (ir_text, _) = nom::multi::many0(nom::branch::alt((
        nom::character::complete::multispace1,
        parse_comment,
    )))(ir_text)?;
    Ok((ir_text, ()))
}

/*
 * A statement ends with optional trailing spaces and an optional comment,
 * followed by a newline or the end of the text.
 */
fn parse_line_end<'a>(ir_text: &'a str) -> nom::IResult<&'a str, ()> {
    let ir_text = nom::character::complete::space0(ir_text)?.0;
    let ir_text = nom::combinator::opt(parse_comment)(ir_text)?.0;
    let ir_text = nom::branch::alt((
        nom::character::complete::line_ending,
        nom::combinator::eof,
    ))(ir_text)?
    .0;
    Ok((ir_text, ()))
}

/*
 * Some tests that demonstrate what the textual format looks like.
 */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ir1() {
        let module = parse(
            "
fn myfunc(p, q)
entry:
  store x, 1          # overwritten below
  store x, 2
  v = load x
  c = lt v, 10
  br left, right
left:
  w = call f, v, 2.5
  ret w
right:
  store y, -3
  ret

fn empty()
",
        )
        .unwrap();

        assert_eq!(module.routines.len(), 2);
        let routine = &module.routines[0];
        assert_eq!(routine.name, "myfunc");
        assert_eq!(routine.params.len(), 2);
        assert_eq!(routine.entry, Some(BlockID::new(0)));
        assert_eq!(routine.blocks.len(), 3);
        assert_eq!(
            routine.successors(BlockID::new(0)),
            &[BlockID::new(1), BlockID::new(2)]
        );

        let entry = routine.get_block(BlockID::new(0));
        assert_eq!(entry.insts.len(), 4);
        assert!(entry.insts[0].is_store());
        assert!(entry.insts[2].is_load());
        assert_eq!(entry.insts[0].location(), entry.insts[2].location());
        assert_eq!(entry.insts[3].lower_case_name(), "lt");

        let left = routine.get_block(BlockID::new(1));
        assert_eq!(
            left.insts[0],
            Instruction::Other {
                result: Some(ValueID::new(5)),
                opcode: String::from("call"),
                args: Box::new([
                    Operand::Value(ValueID::new(6)),
                    Operand::Value(ValueID::new(3)),
                    Operand::Float(ordered_float::OrderedFloat(2.5)),
                ]),
            }
        );
        assert!(routine.get_block(BlockID::new(2)).terminator.is_return());

        let empty = &module.routines[1];
        assert_eq!(empty.entry, None);
        assert!(empty.blocks.is_empty());
    }

    #[test]
    fn forward_references_keep_definition_order() {
        let module = parse(
            "
fn f()
a:
  br c, b
b:
  ret
c:
  br b
",
        )
        .unwrap();
        let routine = &module.routines[0];
        let names: Vec<_> = routine.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            routine.successors(BlockID::new(0)),
            &[BlockID::new(2), BlockID::new(1)]
        );
    }

    #[test]
    fn volatile_accesses_are_other() {
        let module = parse(
            "
fn f()
entry:
  store_volatile x, 1
  v = load_atomic x
  ret v
",
        )
        .unwrap();
        let entry = &module.routines[0].blocks[0];
        assert!(entry
            .insts
            .iter()
            .all(|inst| matches!(inst, Instruction::Other { .. })));
        assert!(entry.insts.iter().all(|inst| inst.location().is_none()));
    }

    #[test]
    fn missing_terminator_is_return() {
        let module = parse("fn f()\nentry:\n  store x, 1\n").unwrap();
        assert_eq!(
            module.routines[0].blocks[0].terminator,
            Terminator::Return(None)
        );
    }

    #[test]
    fn reject_malformed() {
        // Undefined branch target.
        assert!(matches!(
            parse("fn f()\nentry:\n  br nowhere\n"),
            Err(LetheError::Parse(_))
        ));
        // Block defined twice.
        assert!(parse("fn f()\na:\n  ret\na:\n  ret\n").is_err());
        // Instruction outside of a block.
        assert!(parse("fn f()\n  store x, 1\n").is_err());
        // Instruction after a terminator.
        assert!(parse("fn f()\na:\n  ret\n  store x, 1\n").is_err());
        // Load without a result.
        assert!(parse("fn f()\na:\n  load x\n").is_err());
        // Store with a result.
        assert!(parse("fn f()\na:\n  y = store x, 1\n").is_err());
        // Garbage after a statement.
        assert!(parse("fn f()\na:\n  store x, 1 2\n").is_err());
    }
}
