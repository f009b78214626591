//! `touch-node`: the one builtin that reaches into the build graph instead
//! of the variable scope.
//!
//! Grounded in `original_source/jjmake/corefunctions.cpp`'s `TouchNode`
//! (the `Node` subclass) and `TouchNodeFunction` (the registered builtin
//! that constructs one). `TouchNode::hasNewerDependency()` there is a stub
//! that unconditionally returns `true` — spec's Open Question calls this
//! out explicitly and says not to replicate it; [`crate::graph::scheduler::needs_rebuild`]
//! implements the real mtime comparison instead.

use std::path::{Path, PathBuf};

use super::{BuiltinContext, NativeFunction};
use crate::error::ActionError;
use crate::graph::node::{Action, Node};
use crate::graph::scheduler::needs_rebuild;
use crate::path_util::join_under_pwd;
use crate::stat::{self, FileKind};

pub struct TouchNodeAction;

impl Action for TouchNodeAction {
    fn execute(
        &self,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        always_make: bool,
    ) -> Result<(), ActionError> {
        let output = &outputs[0];
        let existing = stat::stat(output).map_err(|e| ActionError::Io {
            path: output.display().to_string(),
            cause: e.to_string(),
        })?;
        match existing.kind {
            FileKind::NoExist => stat::touch(output).map_err(|e| ActionError::Io {
                path: output.display().to_string(),
                cause: e.to_string(),
            }),
            FileKind::RegularFile => {
                let mtime = existing.mtime.expect("regular file has an mtime");
                if always_make || needs_rebuild(inputs, mtime) {
                    stat::touch(output).map_err(|e| ActionError::Io {
                        path: output.display().to_string(),
                        cause: e.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            FileKind::Directory => Err(ActionError::OutputIsDirectory(output.display().to_string())),
            FileKind::Symlink => {
                crate::error::internal_error(format!(
                    "touch-node output \"{}\" is a symlink",
                    output.display()
                ));
            }
            FileKind::Other => Err(ActionError::OutputIsOther(output.display().to_string())),
        }
    }
}

pub struct TouchNodeFn;
impl NativeFunction for TouchNodeFn {
    fn name(&self) -> &'static str {
        "touch-node"
    }
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String> {
        if args.is_empty() {
            return Err("Function 'touch-node' takes 1 or more additional arguments.".into());
        }
        let pwd = ctx.pwd();
        if !Path::new(&pwd).is_absolute() {
            crate::error::internal_error("'.PWD' is not absolute at 'touch-node' call site");
        }
        let output = join_under_pwd(&pwd, &args[0]);
        let inputs: Vec<PathBuf> = args[1..].iter().map(|a| join_under_pwd(&pwd, a)).collect();

        let goal_name = output.display().to_string();
        let node = Node::new(goal_name, inputs, vec![output], Box::new(TouchNodeAction));
        ctx.nodes.borrow_mut().push(node);
        Ok(vec![])
    }
}
