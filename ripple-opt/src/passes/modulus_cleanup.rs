use crate::traversal::{Named, Pass};
use ripple_ir::{Circuit, Expr, Module, PrimOp, RefKind, Stmt, Type};
use ripple_utils::{NameGenerator, RippleResult};
use smallvec::smallvec;

#[derive(Default)]
/// A Verilog `%` has the width of its widest operand, while the IR gives
/// `rem` the width of its narrowest. Every such `rem` is lifted into a
/// fresh node at the Verilog width and replaced by a `bits` extraction
/// back down to the declared result.
pub struct ModulusCleanup;

impl Named for ModulusCleanup {
    fn name() -> &'static str {
        "modulus-cleanup"
    }

    fn description() -> &'static str {
        "widens rem applications so Verilog remainder semantics match"
    }
}

impl Pass for ModulusCleanup {
    fn run(&mut self, circuit: Circuit) -> RippleResult<Circuit> {
        let modules = circuit
            .modules
            .into_iter()
            .map(|m| {
                let names = m.bound_names();
                match m {
                    Module::Internal { name, ports, body } => {
                        let mut ns =
                            NameGenerator::with_prev_defined_names(names);
                        Module::Internal {
                            name,
                            ports,
                            body: cleanup_stmt(body, &mut ns),
                        }
                    }
                    ext => ext,
                }
            })
            .collect();
        Ok(Circuit {
            main: circuit.main,
            modules,
        })
    }
}

fn cleanup_stmt(stmt: Stmt, ns: &mut NameGenerator) -> Stmt {
    if let Stmt::Block(_) = stmt {
        return stmt.map_children(&mut |s| cleanup_stmt(s, ns));
    }
    let mut lifted = Vec::new();
    let stmt = stmt.map_exprs(&mut |e| cleanup_expr(e, ns, &mut lifted));
    if lifted.is_empty() {
        stmt
    } else {
        lifted.push(stmt);
        Stmt::Block(lifted)
    }
}

fn cleanup_expr(
    expr: Expr,
    ns: &mut NameGenerator,
    lifted: &mut Vec<Stmt>,
) -> Expr {
    let expr = expr.map_children(&mut |e| cleanup_expr(e, ns, lifted));
    let Expr::DoPrim {
        op: PrimOp::Rem,
        args,
        consts,
        ty,
    } = expr
    else {
        return expr;
    };
    let verilog_width = args.iter().map(Expr::width).max().unwrap_or(0);
    let width = ty.width();
    if width >= verilog_width {
        return Expr::DoPrim {
            op: PrimOp::Rem,
            args,
            consts,
            ty,
        };
    }
    let wide_ty = if ty.is_signed() {
        Type::sint(verilog_width)
    } else {
        Type::uint(verilog_width)
    };
    let name = ns.gen_name("_GEN");
    lifted.push(Stmt::DefNode {
        name,
        value: Expr::DoPrim {
            op: PrimOp::Rem,
            args,
            consts,
            ty: wide_ty.clone(),
        },
    });
    Expr::DoPrim {
        op: PrimOp::Bits,
        args: vec![Expr::reference(name, wide_ty, RefKind::Node)],
        consts: smallvec![width - 1, 0],
        ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_ir::{Direction, Port};

    fn rem_module() -> Module {
        let a = Expr::reference("a", Type::uint(8), RefKind::Port);
        let b = Expr::reference("b", Type::uint(4), RefKind::Port);
        Module::Internal {
            name: "M".into(),
            ports: vec![
                Port::new("a", Direction::Input, Type::uint(8)),
                Port::new("b", Direction::Input, Type::uint(4)),
                Port::new("z", Direction::Output, Type::uint(4)),
            ],
            body: Stmt::Block(vec![Stmt::Connect {
                loc: Expr::reference("z", Type::uint(4), RefKind::Port),
                rhs: Expr::DoPrim {
                    op: PrimOp::Rem,
                    args: vec![a, b],
                    consts: smallvec![],
                    ty: Type::uint(4),
                },
            }]),
        }
    }

    #[test]
    fn narrow_rem_is_lifted_and_extracted() {
        let circuit = Circuit {
            main: "M".into(),
            modules: vec![rem_module()],
        };
        let out = ModulusCleanup.run(circuit).unwrap();
        let Module::Internal { body, .. } = &out.modules[0] else {
            panic!("expected an internal module");
        };
        let Stmt::Block(stmts) = body else {
            panic!("expected a block body");
        };
        let Stmt::Block(inner) = &stmts[0] else {
            panic!("expected the connect to gain a node block");
        };
        match &inner[0] {
            Stmt::DefNode { name, value } => {
                assert_eq!(*name, "_GEN_0");
                assert_eq!(value.ty(), Type::uint(8));
            }
            s => panic!("expected the widened node first, got {s:?}"),
        }
        match &inner[1] {
            Stmt::Connect { rhs, .. } => {
                assert_eq!(rhs.to_string(), "bits(_GEN_0, 3, 0)");
            }
            s => panic!("expected the rewritten connect, got {s:?}"),
        }
    }

    #[test]
    fn wide_enough_rem_is_untouched() {
        let a = Expr::reference("a", Type::uint(4), RefKind::Port);
        let b = Expr::reference("b", Type::uint(4), RefKind::Port);
        let body = Stmt::Connect {
            loc: Expr::reference("z", Type::uint(4), RefKind::Port),
            rhs: Expr::DoPrim {
                op: PrimOp::Rem,
                args: vec![a, b],
                consts: smallvec![],
                ty: Type::uint(4),
            },
        };
        let circuit = Circuit {
            main: "M".into(),
            modules: vec![Module::Internal {
                name: "M".into(),
                ports: vec![],
                body: body.clone(),
            }],
        };
        let out = ModulusCleanup.run(circuit).unwrap();
        let Module::Internal { body: out_body, .. } = &out.modules[0] else {
            panic!("expected an internal module");
        };
        assert_eq!(*out_body, body);
    }
}
