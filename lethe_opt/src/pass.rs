extern crate lethe_ir;
extern crate log;
extern crate rand;

use std::env::temp_dir;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::prelude::*;
use std::iter::zip;
use std::path::PathBuf;
use std::process::Command;
use std::str::FromStr;

use self::lethe_ir::*;

use crate::dse::*;

/*
 * Passes that can be run on a module.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Verify,
    DSE,
    Print,
    // Whether to draw dead stores in red.
    Xdot(bool),
}

impl FromStr for Pass {
    type Err = LetheError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim() {
            "verify" => Ok(Pass::Verify),
            "dse" | "dse-pass" => Ok(Pass::DSE),
            "print" => Ok(Pass::Print),
            "xdot" => Ok(Pass::Xdot(true)),
            "xdot-plain" => Ok(Pass::Xdot(false)),
            _ => Err(LetheError::UnknownPass(String::from(name.trim()))),
        }
    }
}

impl Display for Pass {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Pass::Verify => write!(f, "verify"),
            Pass::DSE => write!(f, "dse"),
            Pass::Print => write!(f, "print"),
            Pass::Xdot(true) => write!(f, "xdot"),
            Pass::Xdot(false) => write!(f, "xdot-plain"),
        }
    }
}

/*
 * Parse a comma separated list of pass names. Empty entries are skipped, so
 * trailing commas are fine.
 */
pub fn parse_passes(passes: &str) -> LetheResult<Vec<Pass>> {
    passes
        .split(',')
        .filter(|name| !name.trim().is_empty())
        .map(Pass::from_str)
        .collect()
}

/*
 * Manages passes to be run on an IR module. Transparently handles analysis
 * requirements for optimizations. Postorders only depend on control flow,
 * which no pass changes, so they're computed once. Liveness is thrown away
 * whenever a pass removes an instruction.
 */
#[derive(Debug, Clone)]
pub struct PassManager {
    module: Module,

    // Passes to run.
    passes: Vec<Pass>,

    // Configuration.
    sweep_limit: Option<usize>,
    output: Option<PathBuf>,

    // Cached analysis results.
    postorders: Option<Vec<Vec<BlockID>>>,
    liveness: Option<Vec<Liveness>>,

    // Statistics, per routine.
    stores_removed: Vec<usize>,
}

impl PassManager {
    pub fn new(module: Module) -> Self {
        let num_routines = module.routines.len();
        PassManager {
            module,
            passes: vec![],
            sweep_limit: None,
            output: None,
            postorders: None,
            liveness: None,
            stores_removed: vec![0; num_routines],
        }
    }

    pub fn add_pass(&mut self, pass: Pass) {
        self.passes.push(pass);
    }

    /*
     * Cap the number of sweeps the liveness solver may take on any routine.
     */
    pub fn set_sweep_limit(&mut self, sweep_limit: Option<usize>) {
        if self.sweep_limit != sweep_limit {
            self.liveness = None;
        }
        self.sweep_limit = sweep_limit;
    }

    /*
     * Where the print pass writes the module. Defaults to stdout.
     */
    pub fn set_output(&mut self, output: Option<PathBuf>) {
        self.output = output;
    }

    pub fn make_postorders(&mut self) -> LetheResult<()> {
        if self.postorders.is_none() {
            self.postorders = Some(
                self.module
                    .routines
                    .iter()
                    .map(postorder)
                    .collect::<LetheResult<_>>()?,
            );
        }
        Ok(())
    }

    pub fn make_liveness(&mut self) -> LetheResult<()> {
        if self.liveness.is_some() {
            return Ok(());
        }
        self.make_postorders()?;
        let PassManager {
            module,
            sweep_limit,
            postorders,
            liveness: cached,
            ..
        } = self;
        if let Some(postorders) = postorders {
            *cached = Some(
                zip(module.routines.iter(), postorders.iter())
                    .map(|(routine, order)| liveness(routine, order, *sweep_limit))
                    .collect::<LetheResult<_>>()?,
            );
        }
        Ok(())
    }

    /*
     * Dead stores of every routine, without removing them.
     */
    pub fn dead_stores(&mut self) -> LetheResult<Vec<Vec<InstID>>> {
        self.make_liveness()?;
        Ok(match &self.liveness {
            Some(liveness) => zip(self.module.routines.iter(), liveness.iter())
                .map(|(routine, liveness)| find_dead_stores(routine, liveness))
                .collect(),
            None => vec![],
        })
    }

    /*
     * Run every added pass in order. Returns whether any pass changed the
     * module.
     */
    pub fn run_passes(&mut self) -> LetheResult<bool> {
        let mut changed = false;
        for pass in self.passes.clone() {
            log::info!("Running pass {}.", pass);
            match pass {
                Pass::Verify => verify(&self.module)?,
                Pass::DSE => changed |= self.run_dse()?,
                Pass::Print => self.print()?,
                Pass::Xdot(highlight) => self.xdot(highlight)?,
            }
        }
        log::info!(
            "Removed {} store(s) across {} routine(s).",
            self.total_stores_removed(),
            self.module.routines.len()
        );
        Ok(changed)
    }

    fn run_dse(&mut self) -> LetheResult<bool> {
        self.make_liveness()?;
        let liveness = self.liveness.take().unwrap_or_default();
        let mut changed = false;
        for (idx, (routine, liveness)) in
            zip(self.module.routines.iter_mut(), liveness.iter()).enumerate()
        {
            let removed = dse_with_liveness(routine, liveness);
            self.stores_removed[idx] += removed;
            changed |= removed > 0;
        }
        if !changed {
            self.liveness = Some(liveness);
        }
        Ok(changed)
    }

    fn print(&self) -> LetheResult<()> {
        match &self.output {
            Some(path) => {
                let mut file = File::create(path)?;
                write!(file, "{}", self.module)?;
            }
            None => print!("{}", self.module),
        }
        Ok(())
    }

    fn xdot(&mut self, highlight: bool) -> LetheResult<()> {
        let tmp_path = self.write_dot_file(highlight)?;
        Command::new("xdot").args([&tmp_path]).output()?;
        Ok(())
    }

    /*
     * Write the module's graph to a fresh file in the temp directory. Names are
     * randomized so concurrent runs don't clobber each other.
     */
    fn write_dot_file(&mut self, highlight: bool) -> LetheResult<PathBuf> {
        let dead = if highlight {
            Some(self.dead_stores()?)
        } else {
            None
        };
        let mut contents = String::new();
        write_dot(&self.module, dead.as_deref(), &mut contents)?;

        let mut tmp_path = temp_dir();
        tmp_path.push(format!("lethe_{}.dot", rand::random::<u32>()));
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        Ok(tmp_path)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn get_module(self) -> Module {
        self.module
    }

    pub fn stores_removed(&self) -> &[usize] {
        &self.stores_removed
    }

    pub fn total_stores_removed(&self) -> usize {
        self.stores_removed.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ROUTINES: &str = "
fn f()
entry:
  store x, 1
  store x, 2
  v = load x
  ret v

fn g(p)
entry:
  store p, 1
  store y, 5
  br exit
exit:
  v = load p
  ret v
";

    #[test]
    fn pass_names() {
        assert_eq!(
            parse_passes("verify, dse,print,xdot,xdot-plain,dse-pass,").unwrap(),
            vec![
                Pass::Verify,
                Pass::DSE,
                Pass::Print,
                Pass::Xdot(true),
                Pass::Xdot(false),
                Pass::DSE
            ]
        );
        for pass in [Pass::Verify, Pass::DSE, Pass::Print, Pass::Xdot(false)] {
            assert_eq!(pass.to_string().parse::<Pass>(), Ok(pass));
        }
    }

    #[test]
    fn unknown_pass() {
        assert_eq!(
            parse_passes("verify,gvn"),
            Err(LetheError::UnknownPass(String::from("gvn")))
        );
    }

    #[test]
    fn statistics() {
        let mut pm = PassManager::new(parse(TWO_ROUTINES).unwrap());
        pm.add_pass(Pass::Verify);
        pm.add_pass(Pass::DSE);
        assert!(pm.run_passes().unwrap());
        assert_eq!(pm.stores_removed(), &[1, 1]);
        assert_eq!(pm.total_stores_removed(), 2);

        let module = pm.get_module();
        assert_eq!(module.routines[0].num_insts(), 2);
        assert_eq!(module.routines[1].num_insts(), 2);
    }

    #[test]
    fn liveness_is_invalidated_on_change() {
        let mut pm = PassManager::new(parse(TWO_ROUTINES).unwrap());
        pm.make_liveness().unwrap();
        assert!(pm.liveness.is_some());

        pm.add_pass(Pass::DSE);
        assert!(pm.run_passes().unwrap());
        assert!(pm.liveness.is_none());
        assert!(pm.postorders.is_some());

        // Nothing left to remove, so the second run keeps its analysis.
        assert!(!pm.run_passes().unwrap());
        assert!(pm.liveness.is_some());
        assert_eq!(pm.total_stores_removed(), 2);
    }

    #[test]
    fn dead_stores_without_removal() {
        let mut pm = PassManager::new(parse(TWO_ROUTINES).unwrap());
        let dead = pm.dead_stores().unwrap();
        assert_eq!(dead[0], vec![InstID::new(BlockID::new(0), 0)]);
        assert_eq!(dead[1], vec![InstID::new(BlockID::new(0), 1)]);
        assert_eq!(pm.module().routines[0].num_insts(), 3);
    }

    #[test]
    fn sweep_limit_is_enforced() {
        let module = parse("fn f()\nl:\n  v = load x\n  store x, 3\n  br l\n").unwrap();
        let mut pm = PassManager::new(module);
        pm.set_sweep_limit(Some(2));
        pm.add_pass(Pass::DSE);
        assert!(matches!(
            pm.run_passes(),
            Err(LetheError::SweepLimitExceeded { sweeps: 2, .. })
        ));
        pm.set_sweep_limit(None);
        assert!(!pm.run_passes().unwrap());
    }

    #[test]
    fn dot_files_get_distinct_names() {
        let mut pm = PassManager::new(parse(TWO_ROUTINES).unwrap());
        let first = pm.write_dot_file(true).unwrap();
        let second = pm.write_dot_file(false).unwrap();
        assert_ne!(first, second);
        for path in [&first, &second] {
            let contents = std::fs::read_to_string(path).unwrap();
            assert!(contents.starts_with("digraph"));
            std::fs::remove_file(path).unwrap();
        }
    }

    #[test]
    fn verify_rejects_missing_entry() {
        let mut pm = PassManager::new(parse("fn f()\n").unwrap());
        pm.add_pass(Pass::Verify);
        pm.add_pass(Pass::DSE);
        assert!(matches!(
            pm.run_passes(),
            Err(LetheError::InvalidInput(_))
        ));
    }
}
