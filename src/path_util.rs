//! Path joining against `.PWD`, the one path operation builtins need.
//!
//! Grounded in `original_source/jjmake/corefunctions.cpp`'s use of
//! `Path::join(Path(pwd), Path(arg).getAbsolutePath())`: if the argument is
//! itself absolute, the join is a no-op and the argument wins outright. That
//! is exactly `std::path::PathBuf::push`'s behavior, so no custom join logic
//! is needed beyond picking the right two inputs.

use std::path::{Path, PathBuf};

/// Join `arg` against `pwd`. If `arg` is already absolute, it is returned
/// unchanged (as an owned `PathBuf`); in the original source this is the
/// `Path(arg).getAbsolutePath()` special case folded into one join call.
pub fn join_under_pwd(pwd: &str, arg: &str) -> PathBuf {
    let arg_path = Path::new(arg);
    if arg_path.is_absolute() {
        arg_path.to_path_buf()
    } else {
        Path::new(pwd).join(arg_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_arg_joins_under_pwd() {
        assert_eq!(join_under_pwd("/a/b", "c/d"), PathBuf::from("/a/b/c/d"));
    }

    #[test]
    fn absolute_arg_wins_outright() {
        assert_eq!(join_under_pwd("/a/b", "/x/y"), PathBuf::from("/x/y"));
    }
}
