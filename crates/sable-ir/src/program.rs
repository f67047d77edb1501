use indexmap::IndexMap;

use crate::{Cfg, CfgError};

/// Error produced when a frontend hands the engine a malformed program.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("program defines `{name}` twice")]
    DuplicateCfg { name: String },
    #[error("entrypoint `{name}` is not defined")]
    UnknownEntrypoint { name: String },
    #[error("program has no entrypoints")]
    NoEntrypoints,
    #[error(transparent)]
    Cfg(#[from] CfgError),
}

/// A whole program: the unit the interprocedural driver analyzes.
///
/// CFGs are keyed by name and kept in insertion order so that every run
/// visits them identically.
#[derive(Debug, Clone, Default)]
pub struct Program {
    cfgs: IndexMap<String, Cfg>,
    entrypoints: Vec<String>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cfg(&mut self, cfg: Cfg) -> Result<(), ProgramError> {
        let name = cfg.name().to_owned();
        if self.cfgs.contains_key(&name) {
            return Err(ProgramError::DuplicateCfg { name });
        }
        self.cfgs.insert(name, cfg);
        Ok(())
    }

    pub fn add_entrypoint(&mut self, name: impl Into<String>) {
        self.entrypoints.push(name.into());
    }

    pub fn cfg(&self, name: &str) -> Option<&Cfg> {
        self.cfgs.get(name)
    }

    pub fn cfgs(&self) -> impl Iterator<Item = &Cfg> {
        self.cfgs.values()
    }

    pub fn entrypoints(&self) -> &[String] {
        &self.entrypoints
    }

    pub fn is_empty(&self) -> bool {
        self.cfgs.is_empty()
    }

    /// Check the program is analyzable: entrypoints resolve and every CFG
    /// passes its own validation. Finalizes basic blocks as a side effect.
    pub fn validate(&mut self) -> Result<(), ProgramError> {
        if self.entrypoints.is_empty() {
            return Err(ProgramError::NoEntrypoints);
        }
        for name in &self.entrypoints {
            if !self.cfgs.contains_key(name) {
                return Err(ProgramError::UnknownEntrypoint { name: name.clone() });
            }
        }
        for cfg in self.cfgs.values_mut() {
            cfg.validate()?;
            cfg.finalize();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CfgDescriptor, CodeLocation, Expr, Stmt};

    fn trivial_cfg(name: &str) -> Cfg {
        let mut cfg = Cfg::new(CfgDescriptor::new(name));
        cfg.add_statement(Stmt::Return {
            expr: Some(Expr::int(0)),
            location: CodeLocation::line(1),
        });
        cfg
    }

    #[test]
    fn duplicate_cfgs_are_rejected() {
        let mut program = Program::new();
        program.add_cfg(trivial_cfg("main")).unwrap();
        assert!(matches!(
            program.add_cfg(trivial_cfg("main")),
            Err(ProgramError::DuplicateCfg { .. })
        ));
    }

    #[test]
    fn validation_requires_known_entrypoints() {
        let mut program = Program::new();
        program.add_cfg(trivial_cfg("main")).unwrap();
        assert!(matches!(
            program.validate(),
            Err(ProgramError::NoEntrypoints)
        ));
        program.add_entrypoint("missing");
        assert!(matches!(
            program.validate(),
            Err(ProgramError::UnknownEntrypoint { .. })
        ));
        let mut ok = Program::new();
        ok.add_cfg(trivial_cfg("main")).unwrap();
        ok.add_entrypoint("main");
        assert!(ok.validate().is_ok());
    }
}
