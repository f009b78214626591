//! The arithmetic, comparison, accessor, control, and I/O builtins.
//!
//! Arity and message text are grounded in
//! `original_source/jjmake/corefunctions.cpp`'s `AddFunction`,
//! `EqualsFunction`/`NotEqualsFunction`, `GetFunction`/`GetAtFunction`/
//! `GetStarFunction`, `IfFunction`, `IncludeFunction`, `PrintFunction`, and
//! `SetFunction`/`SetaFunction`. Error text there quotes tokens as
//! `>>token<<`; this crate keeps that convention for parity across every
//! builtin's error messages rather than mixing quoting styles.

use super::{BuiltinContext, NativeFunction};
use crate::path_util::join_under_pwd;
use crate::scope::is_reserved;
use crate::value::Value;

pub struct Add;
impl NativeFunction for Add {
    fn name(&self) -> &'static str {
        "add"
    }
    fn call(&self, args: &[String], _ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        if args.is_empty() {
            return Err("Function 'add' takes 1 or more additional arguments.".into());
        }
        let mut sum: i64 = 0;
        for a in args {
            let n: i64 = a
                .parse()
                .map_err(|_| format!("Function 'add' was given non-numeric argument >>{a}<<."))?;
            sum = sum
                .checked_add(n)
                .ok_or_else(|| format!("Function 'add' overflowed summing >>{a}<<."))?;
        }
        Ok(vec![sum.to_string()])
    }
}

pub struct Eq {
    pub negate: bool,
}
impl NativeFunction for Eq {
    fn name(&self) -> &'static str {
        if self.negate {
            "neq"
        } else {
            "eq"
        }
    }
    fn call(&self, args: &[String], _ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        if args.len() != 2 {
            return Err(format!(
                "Function '{}' takes exactly 2 additional arguments.",
                self.name()
            ));
        }
        let equal = args[0] == args[1];
        let truthy = if self.negate { !equal } else { equal };
        Ok(if truthy { vec!["t".to_string()] } else { vec![] })
    }
}

/// `equ` is a plain alias for `eq` — same contract, different registered
/// name, matching the original registering both names against the same
/// implementation.
pub struct EquAlias;
impl NativeFunction for EquAlias {
    fn name(&self) -> &'static str {
        "equ"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        Eq { negate: false }.call(args, ctx)
    }
}

pub struct Get;
impl NativeFunction for Get {
    fn name(&self) -> &'static str {
        "get"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        let name = require_one_name(self.name(), args)?;
        Ok(vec![ctx
            .scope
            .get(name)
            .map(|v| v.first_or_empty().to_string())
            .unwrap_or_default()])
    }
}

pub struct GetAt;
impl NativeFunction for GetAt {
    fn name(&self) -> &'static str {
        "get@"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        let name = require_one_name(self.name(), args)?;
        Ok(ctx.scope.get(name).map(|v| v.elements).unwrap_or_default())
    }
}

pub struct GetStar;
impl NativeFunction for GetStar {
    fn name(&self) -> &'static str {
        "get*"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        let name = require_one_name(self.name(), args)?;
        Ok(vec![ctx
            .scope
            .get(name)
            .map(|v| v.joined_non_empty())
            .unwrap_or_default()])
    }
}

fn require_one_name<'a>(fn_name: &str, args: &'a [String]) -> Result<&'a str, String> {
    if args.len() != 1 {
        return Err(format!(
            "Function '{fn_name}' takes exactly 1 additional argument."
        ));
    }
    if args[0].is_empty() {
        return Err(format!(
            "Function '{fn_name}' does not accept an empty variable name."
        ));
    }
    Ok(&args[0])
}

/// The `(if cond body)` / `(if cond truebody falsebody)` expression form —
/// distinct from the `[if]/[elif]/[then]/[else]/[fi]` control construct the
/// evaluator handles directly. Lazy: `eval_next_argument` is what makes the
/// un-taken branch's side effects never run.
pub struct If;
impl NativeFunction for If {
    fn name(&self) -> &'static str {
        "if"
    }
    fn always_eval_arguments(&self) -> bool {
        false
    }
    fn eval_next_argument(&self, args_so_far: &[String]) -> bool {
        match args_so_far.len() {
            0 => true,
            1 => !args_so_far[0].is_empty(),
            2 => args_so_far[0].is_empty(),
            _ => false,
        }
    }
    fn call(&self, args: &[String], _ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        if args.len() < 2 || args.len() > 3 {
            return Err("Function 'if' takes exactly 2 or 3 additional arguments.".into());
        }
        let cond_true = !args[0].is_empty();
        if cond_true {
            Ok(vec![args[1].clone()])
        } else if args.len() == 3 {
            Ok(vec![args[2].clone()])
        } else {
            Ok(vec![])
        }
    }
}

pub struct Include;
impl NativeFunction for Include {
    fn name(&self) -> &'static str {
        "include"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        if args.len() != 1 {
            return Err("Function 'include' takes exactly 1 additional argument.".into());
        }
        let pwd = ctx.pwd();
        let path = join_under_pwd(&pwd, &args[0]);
        let contents = ctx.read_file(&path).map_err(|e| {
            format!(
                "Function 'include' unable to open file \"{}\". Cause:\n{e}",
                path.display()
            )
        })?;

        let saved_pwd = ctx.scope.get(".PWD");
        let saved_file = ctx.scope.get(".FILE");
        let saved_line = ctx.scope.get(".LINE");
        let saved_col = ctx.scope.get(".COL");

        let new_pwd = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| pwd.clone());
        ctx.scope.set(".PWD", Value::single(new_pwd));
        ctx.scope
            .set(".FILE", Value::single(path.display().to_string()));
        ctx.scope.set(".LINE", Value::single("1"));
        ctx.scope.set(".COL", Value::single("1"));

        let file_label = path.display().to_string();
        let result = ctx.includer.include(&ctx.scope, &contents, &file_label);

        // Only restore on success: if the included file's evaluation fails,
        // `.FILE`/`.LINE`/`.COL` are left pointing at the failure site so
        // the outermost `eval` can format its "Evaluation failure at..."
        // message against the nested file's location, not the includer's.
        if result.is_ok() {
            if let Some(v) = saved_pwd {
                ctx.scope.set(".PWD", v);
            }
            if let Some(v) = saved_file {
                ctx.scope.set(".FILE", v);
            }
            if let Some(v) = saved_line {
                ctx.scope.set(".LINE", v);
            }
            if let Some(v) = saved_col {
                ctx.scope.set(".COL", v);
            }
        }

        result.map(|()| vec![])
    }
}

pub struct Print;
impl NativeFunction for Print {
    fn name(&self) -> &'static str {
        "print"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        let line = args.join(" ");
        let mut buf = ctx.stdout.borrow_mut();
        buf.push_str(&line);
        buf.push('\n');
        Ok(vec![])
    }
}

pub struct Set;
impl NativeFunction for Set {
    fn name(&self) -> &'static str {
        "set"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        if args.len() != 2 {
            return Err("Function 'set' takes exactly 2 additional arguments.".into());
        }
        let name = &args[0];
        if name.is_empty() {
            return Err("Function 'set' does not accept an empty variable name.".into());
        }
        if is_reserved(name) {
            return Err(format!(
                "Function 'set' will not set a variable whose name begins with a dot >>{name}<<."
            ));
        }
        ctx.scope.set(name.clone(), Value::single(args[1].clone()));
        Ok(vec![])
    }
}

pub struct Seta;
impl NativeFunction for Seta {
    fn name(&self) -> &'static str {
        "seta"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        if args.is_empty() {
            return Err("Function 'seta' takes 1 or more additional arguments.".into());
        }
        let name = &args[0];
        if name.is_empty() {
            return Err("Function 'seta' does not accept an empty variable name.".into());
        }
        // Unlike `set`, `seta` does not reject dot-prefixed names — this is
        // the original's own asymmetry (SetaFunction::eval never checks for
        // a leading dot), not an oversight, and is kept deliberately.
        ctx.scope.set(name.clone(), Value::new(args[1..].to_vec()));
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Includer;
    use crate::scope::Scope;
    use std::cell::RefCell;

    struct NullIncluder;
    impl Includer for NullIncluder {
        fn include(&self, _scope: &Scope, _contents: &str, _file_label: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn ctx<'a>(
        scope: Scope,
        stdout: &'a RefCell<String>,
        nodes: &'a RefCell<Vec<crate::graph::Node>>,
        includer: &'a dyn Includer,
    ) -> BuiltinContext<'a> {
        BuiltinContext {
            scope,
            stdout,
            nodes,
            includer,
        }
    }

    #[test]
    fn add_sums_signed_integers() {
        let scope = Scope::root();
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope, &out, &nodes, &inc);
        let result = Add
            .call(&["1".into(), "-3".into(), "5".into()], &c)
            .unwrap();
        assert_eq!(result, vec!["3"]);
    }

    #[test]
    fn add_accepts_a_single_operand() {
        let scope = Scope::root();
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope, &out, &nodes, &inc);
        assert_eq!(Add.call(&["5".into()], &c).unwrap(), vec!["5"]);
    }

    #[test]
    fn add_rejects_zero_arguments() {
        let scope = Scope::root();
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope, &out, &nodes, &inc);
        assert!(Add.call(&[], &c).is_err());
    }

    #[test]
    fn eq_and_neq_agree_inversely() {
        let scope = Scope::root();
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope, &out, &nodes, &inc);
        assert_eq!(
            Eq { negate: false }.call(&["a".into(), "a".into()], &c).unwrap(),
            vec!["t"]
        );
        assert_eq!(
            Eq { negate: true }.call(&["a".into(), "a".into()], &c).unwrap(),
            Vec::<String>::new()
        );
    }

    #[test]
    fn set_rejects_dotted_names() {
        let scope = Scope::root();
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope, &out, &nodes, &inc);
        assert!(Set.call(&[".PWD".into(), "x".into()], &c).is_err());
    }

    #[test]
    fn seta_allows_dotted_names() {
        let scope = Scope::root();
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope.clone(), &out, &nodes, &inc);
        assert!(Seta.call(&[".X".into(), "1".into()], &c).is_ok());
        assert_eq!(scope.get(".X").unwrap().elements, vec!["1"]);
    }

    #[test]
    fn get_star_joins_non_empty_elements() {
        let scope = Scope::root();
        scope.set("A", Value::new(vec!["x".into(), "".into(), "y".into()]));
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope, &out, &nodes, &inc);
        assert_eq!(GetStar.call(&["A".into()], &c).unwrap(), vec!["x y"]);
    }

    #[test]
    fn if_builtin_picks_branch_by_condition_truth() {
        let scope = Scope::root();
        let out = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let inc = NullIncluder;
        let c = ctx(scope, &out, &nodes, &inc);
        assert_eq!(
            If.call(&["t".into(), "yes".into(), "no".into()], &c).unwrap(),
            vec!["yes"]
        );
        assert_eq!(
            If.call(&["".into(), "yes".into(), "no".into()], &c).unwrap(),
            vec!["no"]
        );
    }
}
