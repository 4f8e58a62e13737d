//! Interpreter session: the managers, command dispatch, output.

use rsmv_dd::DdMgr;
use rsmv_enc::EncodingMgr;
use rsmv_expr::{Expr, ExprMgr};
use rsmv_model::ModelMgr;
use rsmv_reach::{
    check_init_consistency, ConsistencyStatus, ReachStatus, Reachability, StrategyConfig,
};
use rsmv_types::TypeMgr;
use rsmv_witness::WitnessMgr;
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

const OUT_PREFIX: &str = "-- ";
const WARN_PREFIX: &str = "!! ";

/// One interpreter session owning every manager.
pub struct Session {
    em: Arc<ExprMgr>,
    tm: Arc<TypeMgr>,
    dd: Arc<DdMgr>,
    enc: Arc<EncodingMgr>,
    model: Arc<ModelMgr>,
    wm: Arc<WitnessMgr>,
    strategies: StrategyConfig,
}

impl Session {
    pub fn new() -> Self {
        let em = Arc::new(ExprMgr::new());
        let tm = Arc::new(TypeMgr::new());
        let dd = Arc::new(DdMgr::new());
        let enc = Arc::new(EncodingMgr::new(dd.clone(), tm.clone()));
        let model = Arc::new(ModelMgr::new(em.clone(), tm.clone()));
        let wm = Arc::new(WitnessMgr::new());
        Self {
            em,
            tm,
            dd,
            enc,
            model,
            wm,
            strategies: StrategyConfig::default(),
        }
    }

    pub fn set_strategy(&mut self, name: &str) -> Result<(), ExitCode> {
        self.strategies = match name {
            "all" => StrategyConfig::default(),
            "forward" => StrategyConfig {
                forward: true,
                backward: false,
                combined: false,
            },
            "backward" => StrategyConfig {
                forward: false,
                backward: true,
                combined: false,
            },
            "combined" => StrategyConfig {
                forward: false,
                backward: false,
                combined: true,
            },
            other => {
                eprintln!("{WARN_PREFIX}unknown strategy `{other}`");
                return Err(ExitCode::from(2));
            }
        };
        Ok(())
    }

    pub fn read_model(&mut self, path: &Path) -> bool {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{WARN_PREFIX}cannot read `{}`: {e}", path.display());
                return false;
            }
        };
        let parsed = match rsmv_syntax::parse_model(&source, &self.em, &self.tm) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("{WARN_PREFIX}{e}");
                return false;
            }
        };
        if let Err(e) = self.model.load(parsed) {
            eprintln!("{WARN_PREFIX}{e}");
            return false;
        }
        println!("{OUT_PREFIX}model `{}` loaded", path.display());
        true
    }

    fn parse_expr(&self, text: &str) -> Option<Expr> {
        match rsmv_syntax::parse_expression(text, &self.em, &self.tm) {
            Ok(e) => Some(e),
            Err(e) => {
                eprintln!("{WARN_PREFIX}{e}");
                None
            }
        }
    }

    fn parse_all(&self, texts: &[String]) -> Option<Vec<Expr>> {
        texts.iter().map(|t| self.parse_expr(t)).collect()
    }

    /// Run a reachability query; the return value is the process retcode.
    pub fn reach(
        &mut self,
        target: &str,
        forward: &[String],
        backward: &[String],
        global: &[String],
    ) -> u8 {
        if target.trim().is_empty() {
            eprintln!("{WARN_PREFIX}no target given, aborting");
            return 2;
        }
        if !self.model.is_loaded() {
            eprintln!("{WARN_PREFIX}model not loaded");
            return 2;
        }

        let Some(target) = self.parse_expr(target) else {
            return 2;
        };
        let (Some(fwd), Some(bwd), Some(glob)) = (
            self.parse_all(forward),
            self.parse_all(backward),
            self.parse_all(global),
        ) else {
            return 2;
        };

        let reach = Reachability::new(
            self.model.clone(),
            self.dd.clone(),
            self.enc.clone(),
            self.wm.clone(),
        );
        let outcome = match reach.process(target, &fwd, &bwd, &glob, self.strategies) {
            Ok(o) => o,
            Err(e) => {
                error!(%e, "reachability analysis failed");
                eprintln!("{WARN_PREFIX}{e}");
                return 3;
            }
        };

        match outcome.status {
            ReachStatus::Reachable => {
                match outcome.witness_id {
                    Some(id) => {
                        let steps = self.wm.get(&id).map(|w| w.len()).unwrap_or(0);
                        println!(
                            "{OUT_PREFIX}Target is reachable, registered witness `{id}`, {steps} steps."
                        );
                    }
                    None => println!("{OUT_PREFIX}Target is reachable."),
                }
                0
            }
            ReachStatus::Unreachable => {
                println!("{WARN_PREFIX}Target is unreachable.");
                1
            }
            ReachStatus::Unknown => {
                println!("{WARN_PREFIX}Reachability could not be decided.");
                2
            }
            ReachStatus::Error => {
                println!("{WARN_PREFIX}Unexpected error.");
                3
            }
        }
    }

    fn check_init(&self) {
        match check_init_consistency(&self.model, &self.dd, &self.enc, &[]) {
            Ok(ConsistencyStatus::Ok) => {
                println!("{OUT_PREFIX}Initial states are consistent.")
            }
            Ok(ConsistencyStatus::Ko) => {
                println!("{WARN_PREFIX}Initial states are inconsistent.")
            }
            Ok(ConsistencyStatus::Undecided) => {
                println!("{WARN_PREFIX}Consistency could not be decided.")
            }
            Err(e) => eprintln!("{WARN_PREFIX}{e}"),
        }
    }

    fn show_witness(&self) {
        let Some(witness) = self.wm.current() else {
            println!("{WARN_PREFIX}no current witness");
            return;
        };
        println!(
            "{OUT_PREFIX}witness `{}`, {} steps",
            witness.id(),
            witness.len()
        );
        for (i, frame) in witness.frames().iter().enumerate() {
            println!(":: step {i}");
            let mut lines: Vec<String> = frame
                .entries()
                .map(|(key, value)| {
                    let mut name = self.em.print(key.ctx);
                    if !name.is_empty() {
                        name.push('.');
                    }
                    name.push_str(&self.em.print(key.expr));
                    let name = name.trim_start_matches('.');
                    format!("   {} = {}", name, self.em.print(*value))
                })
                .collect();
            lines.sort();
            for line in lines {
                println!("{line}");
            }
        }
    }

    fn eval(&self, args: &str) {
        let Some(witness) = self.wm.current() else {
            println!("{WARN_PREFIX}no current witness");
            return;
        };
        let Some((step_text, expr_text)) = args.split_once(' ') else {
            eprintln!("{WARN_PREFIX}usage: eval <step> <expression>");
            return;
        };
        let Ok(step) = step_text.parse::<u64>() else {
            eprintln!("{WARN_PREFIX}malformed step `{step_text}`");
            return;
        };
        let Some(expr) = self.parse_expr(expr_text) else {
            return;
        };
        match rsmv_witness::eval(&witness, &self.model, self.em.make_empty(), expr, step) {
            Ok(v) => println!("{OUT_PREFIX}{}", self.em.print(v)),
            Err(e) => eprintln!("{WARN_PREFIX}{e}"),
        }
    }

    /// The interactive loop. The last `reach` retcode becomes the exit
    /// code.
    pub fn repl(&mut self) -> ExitCode {
        let stdin = std::io::stdin();
        let mut retcode = 0u8;
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => break,
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
            match command {
                "quit" | "exit" => break,
                "read-model" => {
                    self.read_model(Path::new(rest.trim()));
                }
                "check-init" => self.check_init(),
                "reach" => {
                    retcode = self.reach(rest, &[], &[], &[]);
                }
                "witness" => self.show_witness(),
                "witnesses" => {
                    for id in self.wm.list() {
                        println!("{OUT_PREFIX}{id}");
                    }
                }
                "eval" => self.eval(rest.trim()),
                "help" => {
                    println!("{OUT_PREFIX}commands: read-model <file>, check-init, reach <expr>,");
                    println!("{OUT_PREFIX}          witness, witnesses, eval <step> <expr>, quit");
                }
                other => {
                    eprintln!("{WARN_PREFIX}unknown command `{other}` (try `help`)");
                }
            }
        }
        ExitCode::from(retcode)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(session: &mut Session, src: &str) {
        let parsed = rsmv_syntax::parse_model(src, &session.em, &session.tm).unwrap();
        session.model.load(parsed).unwrap();
    }

    const TOGGLE: &str = "
        MODULE main
        VAR
          x : boolean;
        INIT
          !x;
        TRANS
          next(x) = !x;
    ";

    #[test]
    fn reach_retcodes_follow_the_decision() {
        let mut session = Session::new();
        load(&mut session, TOGGLE);

        assert_eq!(session.reach("x", &[], &[], &[]), 0);
        assert_eq!(session.reach("x & !x", &[], &[], &[]), 1);
    }

    #[test]
    fn missing_model_and_target_are_rejected() {
        let mut session = Session::new();
        assert_eq!(session.reach("x", &[], &[], &[]), 2);

        load(&mut session, TOGGLE);
        assert_eq!(session.reach("  ", &[], &[], &[]), 2);
    }

    #[test]
    fn witnesses_accumulate_per_query() {
        let mut session = Session::new();
        load(&mut session, TOGGLE);
        session.reach("x", &[], &[], &[]);
        session.reach("!x", &[], &[], &[]);
        assert_eq!(session.wm.list(), vec!["reach_1", "reach_2"]);
        assert_eq!(session.wm.current().unwrap().id(), "reach_2");
    }

    #[test]
    fn strategy_names_parse() {
        let mut session = Session::new();
        assert!(session.set_strategy("forward").is_ok());
        assert!(!session.strategies.backward);
        assert!(session.set_strategy("bogus").is_err());
    }
}
