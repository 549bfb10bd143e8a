//! Edge case tests for wispc-vm: the runtime-error boundary behaviors
//! spec.md §8 "Boundary behaviors" names.

#[cfg(test)]
mod tests {
    use crate::{InterpretResult, Vm};

    fn run(source: &str) -> InterpretResult {
        Vm::new().interpret(source.as_bytes())
    }

    #[test]
    fn test_edge_wrong_arity_is_a_runtime_error() {
        assert_eq!(run("fun f(a, b) { return a + b; } f(1);"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_matching_arity_is_ok() {
        assert_eq!(run("fun f(a, b) { return a + b; } f(1, 2);"), InterpretResult::Ok);
    }

    #[test]
    fn test_edge_read_of_undefined_global_is_a_runtime_error() {
        assert_eq!(run("print undefined_name;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_assignment_to_undefined_global_is_a_runtime_error() {
        assert_eq!(run("undefined_name = 1;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_calling_a_non_callable_is_a_runtime_error() {
        assert_eq!(run("var x = 1; x();"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_property_access_on_non_instance_is_a_runtime_error() {
        assert_eq!(run("var x = 1; print x.field;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_property_set_on_non_instance_is_a_runtime_error() {
        assert_eq!(run("var x = 1; x.field = 2;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_inheriting_from_a_non_class_is_a_runtime_error() {
        assert_eq!(run("var NotAClass = 1; class B < NotAClass {}"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_undefined_method_call_is_a_runtime_error() {
        assert_eq!(run("class A {} A().missing();"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_undefined_property_read_is_a_runtime_error() {
        assert_eq!(run("class A {} print A().missing;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_edge_stack_overflow_from_unbounded_recursion_is_a_runtime_error() {
        assert_eq!(run("fun f() { return f() + 1; } f();"), InterpretResult::RuntimeError);
    }
}
