use crate::traversal::{Named, Pass};
use ripple_ir::{Circuit, Expr, Module, PrimOp, Stmt};
use ripple_utils::RippleResult;
use smallvec::SmallVec;

#[derive(Default)]
/// Rewrites `tail` over `add`/`sub`/`shl`/`dshl` into the width-carrying
/// operators `addw`/`subw`/`shlw`/`dshlw`, typed at the tail's result, so
/// that every operator's result width is expressible in Verilog.
pub struct WidthWrap;

impl Named for WidthWrap {
    fn name() -> &'static str {
        "width-wrap"
    }

    fn description() -> &'static str {
        "replaces tail-of-operator patterns with width-carrying operators"
    }
}

impl Pass for WidthWrap {
    fn run(&mut self, circuit: Circuit) -> RippleResult<Circuit> {
        let modules = circuit
            .modules
            .into_iter()
            .map(|m| match m {
                Module::Internal { name, ports, body } => Module::Internal {
                    name,
                    ports,
                    body: wrap_stmt(body),
                },
                ext => ext,
            })
            .collect();
        Ok(Circuit {
            main: circuit.main,
            modules,
        })
    }
}

fn wrap_stmt(stmt: Stmt) -> Stmt {
    stmt.map_children(&mut wrap_stmt).map_exprs(&mut wrap_expr)
}

fn wrap_expr(expr: Expr) -> Expr {
    let expr = expr.map_children(&mut wrap_expr);
    let Expr::DoPrim {
        op: PrimOp::Tail,
        mut args,
        consts,
        ty,
    } = expr
    else {
        return expr;
    };
    debug_assert_eq!(args.len(), 1);
    let arg = args.remove(0);
    match arg {
        Expr::DoPrim {
            op: PrimOp::Add,
            args: inner_args,
            ..
        } => Expr::DoPrim {
            op: PrimOp::Addw,
            args: inner_args,
            consts: SmallVec::new(),
            ty,
        },
        Expr::DoPrim {
            op: PrimOp::Sub,
            args: inner_args,
            ..
        } => Expr::DoPrim {
            op: PrimOp::Subw,
            args: inner_args,
            consts: SmallVec::new(),
            ty,
        },
        // The constant-shift variant keeps its shift amount.
        Expr::DoPrim {
            op: PrimOp::Shl,
            args: inner_args,
            consts: inner_consts,
            ..
        } => Expr::DoPrim {
            op: PrimOp::Shlw,
            args: inner_args,
            consts: inner_consts,
            ty,
        },
        Expr::DoPrim {
            op: PrimOp::Dshl,
            args: inner_args,
            ..
        } => Expr::DoPrim {
            op: PrimOp::Dshlw,
            args: inner_args,
            consts: SmallVec::new(),
            ty,
        },
        arg => Expr::DoPrim {
            op: PrimOp::Tail,
            args: vec![arg],
            consts,
            ty,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_ir::{RefKind, Type};
    use smallvec::smallvec;

    fn wire(name: &str, width: u64) -> Expr {
        Expr::reference(name, Type::uint(width), RefKind::Wire)
    }

    fn tail_of(op: PrimOp, width: u64) -> Expr {
        Expr::DoPrim {
            op: PrimOp::Tail,
            args: vec![Expr::DoPrim {
                op,
                args: vec![wire("a", width), wire("b", width)],
                consts: smallvec![],
                ty: Type::uint(width + 1),
            }],
            consts: smallvec![1],
            ty: Type::uint(width),
        }
    }

    #[test]
    fn tail_of_add_becomes_addw() {
        let e = wrap_expr(tail_of(PrimOp::Add, 8));
        match e {
            Expr::DoPrim {
                op: PrimOp::Addw,
                args,
                consts,
                ty,
            } => {
                assert_eq!(args.len(), 2);
                assert!(consts.is_empty());
                assert_eq!(ty, Type::uint(8));
            }
            e => panic!("expected addw, got {e}"),
        }
    }

    #[test]
    fn tail_of_sub_becomes_subw() {
        let e = wrap_expr(tail_of(PrimOp::Sub, 4));
        assert!(matches!(
            e,
            Expr::DoPrim {
                op: PrimOp::Subw,
                ..
            }
        ));
    }

    #[test]
    fn tail_of_shl_keeps_its_shift_amount() {
        let e = Expr::DoPrim {
            op: PrimOp::Tail,
            args: vec![Expr::DoPrim {
                op: PrimOp::Shl,
                args: vec![wire("a", 8)],
                consts: smallvec![3],
                ty: Type::uint(11),
            }],
            consts: smallvec![3],
            ty: Type::uint(8),
        };
        match wrap_expr(e) {
            Expr::DoPrim {
                op: PrimOp::Shlw,
                consts,
                ty,
                ..
            } => {
                assert_eq!(consts.as_slice(), &[3]);
                assert_eq!(ty, Type::uint(8));
            }
            e => panic!("expected shlw, got {e}"),
        }
    }

    #[test]
    fn unrelated_tails_survive() {
        let e = Expr::DoPrim {
            op: PrimOp::Tail,
            args: vec![wire("a", 8)],
            consts: smallvec![2],
            ty: Type::uint(6),
        };
        let kept = wrap_expr(e.clone());
        assert_eq!(kept, e);
    }
}
