//! Infix printer with operator-precedence parenthesization.

use crate::{Expr, ExprMgr, ExprOp};

/// Binding strength; larger binds tighter. Leaves are maximal.
fn precedence(op: ExprOp) -> u8 {
    match op {
        ExprOp::Ite | ExprOp::Cond => 1,
        ExprOp::Implies => 2,
        ExprOp::Iff => 3,
        ExprOp::Or => 4,
        ExprOp::Xor | ExprOp::Xnor => 5,
        ExprOp::And => 6,
        ExprOp::Eq | ExprOp::Ne | ExprOp::Lt | ExprOp::Le | ExprOp::Gt | ExprOp::Ge => 7,
        ExprOp::U | ExprOp::R => 8,
        ExprOp::LShift | ExprOp::RShift => 9,
        ExprOp::Add | ExprOp::Sub => 10,
        ExprOp::Mul | ExprOp::Div | ExprOp::Mod => 11,
        ExprOp::Neg | ExprOp::Not | ExprOp::G | ExprOp::F | ExprOp::X => 12,
        ExprOp::Next | ExprOp::Prev | ExprOp::At | ExprOp::Type => 13,
        ExprOp::Dot | ExprOp::Subscript | ExprOp::Bitslice => 14,
        ExprOp::Ident | ExprOp::Num | ExprOp::True | ExprOp::False => 15,
    }
}

fn binary_symbol(op: ExprOp) -> &'static str {
    match op {
        ExprOp::Add => "+",
        ExprOp::Sub => "-",
        ExprOp::Mul => "*",
        ExprOp::Div => "/",
        ExprOp::Mod => "%",
        ExprOp::LShift => "<<",
        ExprOp::RShift => ">>",
        ExprOp::And => "&",
        ExprOp::Or => "|",
        ExprOp::Xor => "xor",
        ExprOp::Xnor => "xnor",
        ExprOp::Implies => "->",
        ExprOp::Iff => "<->",
        ExprOp::Eq => "=",
        ExprOp::Ne => "!=",
        ExprOp::Lt => "<",
        ExprOp::Le => "<=",
        ExprOp::Gt => ">",
        ExprOp::Ge => ">=",
        ExprOp::U => "U",
        ExprOp::R => "R",
        _ => unreachable!("not an infix operator"),
    }
}

impl ExprMgr {
    /// Render an expression to its concrete syntax.
    pub fn print(&self, e: Expr) -> String {
        let mut out = String::new();
        self.print_into(&mut out, e, 0);
        out
    }

    fn print_into(&self, out: &mut String, e: Expr, parent: u8) {
        let node = self.node(e);
        let prec = precedence(node.op);
        let parens = prec < parent;
        if parens {
            out.push('(');
        }

        match node.op {
            ExprOp::Ident => out.push_str(&self.ident_name(e).unwrap()),
            ExprOp::Num => out.push_str(&node.value.to_string()),
            ExprOp::True => out.push_str("TRUE"),
            ExprOp::False => out.push_str("FALSE"),

            ExprOp::Neg => {
                out.push('-');
                self.print_into(out, node.lhs, prec);
            }
            ExprOp::Not => {
                out.push('!');
                self.print_into(out, node.lhs, prec);
            }
            ExprOp::G | ExprOp::F | ExprOp::X => {
                out.push_str(match node.op {
                    ExprOp::G => "G ",
                    ExprOp::F => "F ",
                    _ => "X ",
                });
                self.print_into(out, node.lhs, prec);
            }
            ExprOp::Next => {
                out.push_str("next(");
                self.print_into(out, node.lhs, 0);
                out.push(')');
            }
            ExprOp::Prev => {
                out.push_str("prev(");
                self.print_into(out, node.lhs, 0);
                out.push(')');
            }
            ExprOp::At => {
                out.push('@');
                out.push_str(&node.value.to_string());
                out.push('{');
                self.print_into(out, node.lhs, 0);
                out.push('}');
            }
            ExprOp::Type => {
                self.print_into(out, node.lhs, prec);
            }

            ExprOp::Dot => {
                self.print_into(out, node.lhs, prec);
                out.push('.');
                self.print_into(out, node.rhs, prec);
            }
            ExprOp::Subscript => {
                self.print_into(out, node.lhs, prec);
                out.push('[');
                self.print_into(out, node.rhs, 0);
                out.push(']');
            }
            ExprOp::Bitslice => {
                self.print_into(out, node.lhs, prec);
                out.push_str("[:");
                self.print_into(out, node.rhs, 0);
                out.push(']');
            }

            ExprOp::Ite => {
                let cond = self.node(node.lhs);
                debug_assert_eq!(cond.op, ExprOp::Cond);
                self.print_into(out, cond.lhs, prec + 1);
                out.push_str(" ? ");
                self.print_into(out, cond.rhs, prec + 1);
                out.push_str(" : ");
                self.print_into(out, node.rhs, prec);
            }
            ExprOp::Cond => {
                // only reachable when printing a bare Cond subtree
                self.print_into(out, node.lhs, prec + 1);
                out.push_str(" ? ");
                self.print_into(out, node.rhs, prec + 1);
            }

            op => {
                self.print_into(out, node.lhs, prec + 1);
                out.push(' ');
                out.push_str(binary_symbol(op));
                out.push(' ');
                self.print_into(out, node.rhs, prec + 1);
            }
        }

        if parens {
            out.push(')');
        }
    }
}
