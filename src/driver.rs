//! Entry-point driver
//!
//! Runs a module's top-level statements, then calls the configured entry
//! function with no arguments and turns its result into a process status.

use tracing::info;

use crate::ast::Module;
use crate::config::RuntimeConfig;
use crate::error::EvalResult;
use crate::evaluator::Interpreter;
use crate::output::Output;
use crate::value::Value;

/// Result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Value returned by the entry function (`None` when it was not called)
    pub value: Value,
    pub exit_code: i32,
}

/// Map an entry function's result to a process exit status
///
/// Only `None`, `False` and `0` report success. Negative ints wrap modulo
/// 256 like a POSIX status byte and large ones saturate at 255, so neither
/// ever lands on 0.
pub fn exit_status(value: &Value) -> i32 {
    match value {
        Value::None => 0,
        Value::Bool(b) => *b as i32,
        Value::Int(i) if *i < 0 => match i.rem_euclid(256) {
            0 => 255,
            code => code as i32,
        },
        Value::Int(i) => (*i).min(255) as i32,
        _ => 1,
    }
}

/// Run `module` on an existing interpreter
pub fn run(interpreter: &mut Interpreter, module: &Module) -> EvalResult<RunOutcome> {
    info!(statements = module.statements.len(), "starting program");
    interpreter.run_module(module)?;

    let value = match interpreter.config().entry_point.clone() {
        Some(entry) => {
            let env = interpreter.environment();
            let function = env.lookup(env.root(), &entry)?;
            info!(entry = %entry, "calling entry point");
            interpreter.call_value(&function, Vec::new())?
        }
        None => Value::None,
    };

    let exit_code = exit_status(&value);
    info!(exit_code, "program finished");
    Ok(RunOutcome { value, exit_code })
}

/// Build an interpreter for `config` and run `module` on it
pub fn run_program(
    module: &Module,
    config: RuntimeConfig,
    output: Box<dyn Output>,
) -> EvalResult<RunOutcome> {
    let mut interpreter = Interpreter::with_output(config, output);
    run(&mut interpreter, module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::error::ErrorKind;
    use crate::output::BufferOutput;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(exit_status(&Value::None), 0);
        assert_eq!(exit_status(&Value::Bool(true)), 1);
        assert_eq!(exit_status(&Value::Bool(false)), 0);
        assert_eq!(exit_status(&Value::Int(3)), 3);
        assert_eq!(exit_status(&Value::Int(0)), 0);
        assert_eq!(exit_status(&Value::Int(-1)), 255);
        assert_eq!(exit_status(&Value::Int(-2)), 254);
        assert_eq!(exit_status(&Value::Int(-256)), 255);
        assert_eq!(exit_status(&Value::Int(256)), 255);
        assert_eq!(exit_status(&Value::Int(1000)), 255);
        assert_eq!(exit_status(&Value::text("x")), 1);
    }

    #[test]
    fn test_entry_called_after_module_body() {
        let buffer = BufferOutput::new();
        let program = module(vec![
            def(
                "main",
                &[],
                vec![print(vec![text("main")]), return_(int(7))],
            ),
            print(vec![text("top")]),
        ]);
        let outcome =
            run_program(&program, RuntimeConfig::default(), Box::new(buffer.clone())).unwrap();
        assert_eq!(outcome.exit_code, 7);
        assert_eq!(buffer.contents(), "top\nmain\n");
    }

    #[test]
    fn test_missing_entry_is_name_error() {
        let program = module(vec![assign("x", int(1))]);
        let err = run_program(
            &program,
            RuntimeConfig::default(),
            Box::new(BufferOutput::new()),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameError);
        assert_eq!(err.message, "name 'main' is not defined");
    }

    #[test]
    fn test_entry_can_be_disabled() {
        let config = RuntimeConfig {
            entry_point: None,
            ..RuntimeConfig::default()
        };
        let program = module(vec![assign("x", int(1))]);
        let outcome = run_program(&program, config, Box::new(BufferOutput::new())).unwrap();
        assert_eq!(outcome.value, Value::None);
        assert_eq!(outcome.exit_code, 0);
    }
}
