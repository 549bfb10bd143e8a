//! Edge case tests for wispc-compiler: the compile-time limits spec.md §8
//! "Boundary behaviors" names.

#[cfg(test)]
mod tests {
    use crate::compile;
    use wispc_core::Heap;

    fn compiles(source: &str) -> bool {
        let mut heap = Heap::new();
        compile(source.as_bytes(), &mut heap).is_ok()
    }

    #[test]
    fn test_edge_255_locals_compile() {
        let mut source = String::from("{\n");
        for i in 0..255 {
            source.push_str(&format!("var l{i} = {i};\n"));
        }
        source.push('}');
        assert!(compiles(&source));
    }

    #[test]
    fn test_edge_256th_local_is_a_compile_error() {
        let mut source = String::from("{\n");
        for i in 0..256 {
            source.push_str(&format!("var l{i} = {i};\n"));
        }
        source.push('}');
        assert!(!compiles(&source));
    }

    #[test]
    fn test_edge_256_upvalues_compile() {
        let mut source = String::from("fun outer() {\n");
        for i in 0..256 {
            source.push_str(&format!("var u{i} = {i};\n"));
        }
        source.push_str("fun inner() {\n");
        for i in 0..256 {
            source.push_str(&format!("u{i};\n"));
        }
        source.push_str("}\n}\n");
        assert!(compiles(&source));
    }

    #[test]
    fn test_edge_257th_upvalue_is_a_compile_error() {
        let mut source = String::from("fun outer() {\n");
        for i in 0..257 {
            source.push_str(&format!("var u{i} = {i};\n"));
        }
        source.push_str("fun inner() {\n");
        for i in 0..257 {
            source.push_str(&format!("u{i};\n"));
        }
        source.push_str("}\n}\n");
        assert!(!compiles(&source));
    }

    #[test]
    fn test_edge_255_arguments_compile() {
        let params: Vec<String> = (0..255).map(|i| format!("p{i}")).collect();
        let source = format!("fun f({}) {{ return 0; }} f({});", params.join(", "), params.join(", "));
        assert!(compiles(&source));
    }

    #[test]
    fn test_edge_256th_argument_is_a_compile_error() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("fun f() {{}} f({});", args.join(", "));
        assert!(!compiles(&source));
    }

    #[test]
    fn test_edge_256th_parameter_is_a_compile_error() {
        let params: Vec<String> = (0..256).map(|i| format!("p{i}")).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));
        assert!(!compiles(&source));
    }

    #[test]
    fn test_edge_257th_constant_is_a_compile_error() {
        let mut source = String::new();
        for i in 0..257 {
            source.push_str(&format!("\"const{i}\";\n"));
        }
        assert!(!compiles(&source));
    }

    #[test]
    fn test_edge_moderately_long_jump_compiles() {
        let mut body = String::new();
        for i in 0..50 {
            body.push_str(&format!("var a{i} = {i}; if (a{i} == {i}) {{ a{i} = a{i} + 1; }}\n"));
        }
        let source = format!("if (true) {{\n{body}}}");
        assert!(compiles(&source));
    }

    #[test]
    fn test_edge_65536_byte_jump_is_a_compile_error() {
        let mut body = String::new();
        for _ in 0..35_000 {
            body.push_str("nil;\n");
        }
        let source = format!("if (true) {{\n{body}}}");
        assert!(!compiles(&source));
    }

    #[test]
    fn test_edge_initializer_returning_a_value_is_a_compile_error() {
        assert!(!compiles("class A { init() { return 1; } }"));
    }

    #[test]
    fn test_edge_initializer_bare_return_compiles() {
        assert!(compiles("class A { init() { return; } }"));
    }

    #[test]
    fn test_edge_return_from_top_level_is_a_compile_error() {
        assert!(!compiles("return 1;"));
    }
}
