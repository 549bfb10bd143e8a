//! Runtime error messages raised from within the dispatch loop (spec.md §7,
//! §4.6 "Failure points during dispatch").

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    AddOperandsMismatch,
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Division by zero in '%'.")]
    ModuloByZero,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: u8, got: u8 },
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Only instances have properties.")]
    OnlyInstancesHaveProperties,
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("Superclass must be a class.")]
    SuperclassMustBeClass,
    #[error("{0}")]
    Native(String),
}
