use super::ast::{sign, BinaryOp, Expr, Function, UnaryOp};
use crate::traits::Scalar;

/// OpCodes for the stack-based virtual machine.
/// The VM operates on a stack of `Scalar` values (f64 or Dual).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant onto the stack.
    LoadConst(f64),
    /// Pushes a state variable by index.
    LoadVar(usize),
    /// Pushes a parameter by index.
    LoadParam(usize),
    /// Pops (b, a), pushes a + b.
    Add,
    /// Pops (b, a), pushes a - b.
    Sub,
    /// Pops (b, a), pushes a * b.
    Mul,
    /// Pops (b, a), pushes a / b.
    Div,
    /// Pops (b, a), pushes a ^ b.
    Pow,
    /// Pops a, pushes a ^ n for a literal integer exponent.
    PowI(i32),
    Neg,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sqrt,
    Abs,
    Sign,
}

/// A compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

impl Bytecode {
    /// Deepest stack the program reaches, so callers can size the buffer once.
    pub fn max_stack(&self) -> usize {
        let mut depth: usize = 0;
        let mut max = 0;
        for op in &self.ops {
            match op {
                OpCode::LoadConst(_) | OpCode::LoadVar(_) | OpCode::LoadParam(_) => depth += 1,
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            max = max.max(depth);
        }
        max
    }
}

/// Stateless stack machine.
///
/// Missing variable or parameter slots read as NaN, which the callers treat
/// like any other non-finite evaluation.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, vars: &[T], params: &[T], stack: &mut Vec<T>) -> T {
        stack.clear();

        for op in &bytecode.ops {
            let value = match *op {
                OpCode::LoadConst(val) => T::constant(val),
                OpCode::LoadVar(idx) => vars.get(idx).copied().unwrap_or_else(T::nan),
                OpCode::LoadParam(idx) => params.get(idx).copied().unwrap_or_else(T::nan),
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    let b = pop(stack);
                    let a = pop(stack);
                    match op {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a.powf(b),
                    }
                }
                OpCode::PowI(n) => pop(stack).powi(n),
                OpCode::Neg => -pop(stack),
                OpCode::Sin => pop(stack).sin(),
                OpCode::Cos => pop(stack).cos(),
                OpCode::Tan => pop(stack).tan(),
                OpCode::Exp => pop(stack).exp(),
                OpCode::Log => pop(stack).ln(),
                OpCode::Sqrt => pop(stack).sqrt(),
                OpCode::Abs => pop(stack).abs(),
                OpCode::Sign => sign(pop(stack)),
            };
            stack.push(value);
        }

        pop(stack)
    }
}

fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
    stack.pop().unwrap_or_else(T::nan)
}

/// Lowers an AST to bytecode. Names were resolved to indices by the parser.
pub fn compile(expr: &Expr) -> Bytecode {
    let mut ops = Vec::new();
    compile_recursive(expr, &mut ops);
    Bytecode { ops }
}

fn compile_recursive(expr: &Expr, ops: &mut Vec<OpCode>) {
    match expr {
        Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
        Expr::Constant(c) => ops.push(OpCode::LoadConst(c.value())),
        Expr::Variable(idx) => ops.push(OpCode::LoadVar(*idx)),
        Expr::Parameter(idx) => ops.push(OpCode::LoadParam(*idx)),
        Expr::Binary(base, BinaryOp::Pow, exponent) if integer_exponent(exponent).is_some() => {
            compile_recursive(base, ops);
            if let Some(n) = integer_exponent(exponent) {
                ops.push(OpCode::PowI(n));
            }
        }
        Expr::Binary(left, op, right) => {
            compile_recursive(left, ops);
            compile_recursive(right, ops);
            ops.push(match op {
                BinaryOp::Add => OpCode::Add,
                BinaryOp::Sub => OpCode::Sub,
                BinaryOp::Mul => OpCode::Mul,
                BinaryOp::Div => OpCode::Div,
                BinaryOp::Pow => OpCode::Pow,
            });
        }
        Expr::Unary(UnaryOp::Neg, operand) => {
            compile_recursive(operand, ops);
            ops.push(OpCode::Neg);
        }
        Expr::Call(function, arg) => {
            compile_recursive(arg, ops);
            ops.push(match function {
                Function::Sin => OpCode::Sin,
                Function::Cos => OpCode::Cos,
                Function::Tan => OpCode::Tan,
                Function::Exp => OpCode::Exp,
                Function::Log => OpCode::Log,
                Function::Sqrt => OpCode::Sqrt,
                Function::Abs => OpCode::Abs,
                Function::Sign => OpCode::Sign,
            });
        }
    }
}

/// Literal exponents like `2` or `-1` (also `-(1)`) get the exact `powi` path.
fn integer_exponent(expr: &Expr) -> Option<i32> {
    let value = match expr {
        Expr::Number(n) => *n,
        Expr::Unary(UnaryOp::Neg, inner) => -inner.number()?,
        _ => return None,
    };
    if value.fract() == 0.0 && value.abs() <= f64::from(i16::MAX) {
        Some(value as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Dual;
    use approx::assert_relative_eq;

    fn run(ops: Vec<OpCode>, vars: &[f64], params: &[f64]) -> f64 {
        VM::execute(&Bytecode { ops }, vars, params, &mut Vec::new())
    }

    #[test]
    fn executes_postfix_programs() {
        // (x + r) * 2
        let ops = vec![
            OpCode::LoadVar(0),
            OpCode::LoadParam(0),
            OpCode::Add,
            OpCode::LoadConst(2.0),
            OpCode::Mul,
        ];
        assert_relative_eq!(run(ops, &[1.5], &[0.5]), 4.0);
    }

    #[test]
    fn integer_exponents_compile_to_powi() {
        let expr = Expr::Binary(
            Box::new(Expr::Variable(0)),
            BinaryOp::Pow,
            Box::new(Expr::Unary(UnaryOp::Neg, Box::new(Expr::Number(3.0)))),
        );
        let code = compile(&expr);
        assert_eq!(code.ops, vec![OpCode::LoadVar(0), OpCode::PowI(-3)]);
        assert_relative_eq!(VM::execute(&code, &[2.0], &[], &mut Vec::new()), 0.125);
    }

    #[test]
    fn negative_base_with_cube_keeps_sign() {
        let expr = Expr::Binary(
            Box::new(Expr::Variable(0)),
            BinaryOp::Pow,
            Box::new(Expr::Number(3.0)),
        );
        let code = compile(&expr);
        let value = VM::execute(&code, &[Dual::new(-2.0, 1.0)], &[], &mut Vec::new());
        assert_relative_eq!(value.val, -8.0);
        assert_relative_eq!(value.eps, 12.0);
    }

    #[test]
    fn sign_of_a_dual_drops_the_tangent() {
        let code = Bytecode {
            ops: vec![OpCode::LoadVar(0), OpCode::Sign],
        };
        let at_zero = VM::execute(&code, &[Dual::new(0.0, 1.0)], &[], &mut Vec::new());
        assert_eq!((at_zero.val, at_zero.eps), (0.0, 0.0));
        let negative = VM::execute(&code, &[Dual::new(-2.0, 1.0)], &[], &mut Vec::new());
        assert_eq!((negative.val, negative.eps), (-1.0, 0.0));
    }

    #[test]
    fn missing_slots_read_as_nan() {
        assert!(run(vec![OpCode::LoadVar(3)], &[1.0], &[]).is_nan());
        assert!(run(vec![], &[], &[]).is_nan());
    }

    #[test]
    fn max_stack_tracks_depth() {
        let code = Bytecode {
            ops: vec![
                OpCode::LoadVar(0),
                OpCode::LoadVar(1),
                OpCode::LoadConst(1.0),
                OpCode::Add,
                OpCode::Mul,
            ],
        };
        assert_eq!(code.max_stack(), 3);
    }
}
