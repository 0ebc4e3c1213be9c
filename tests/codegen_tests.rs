use smallcc::analyzer::{analyze, SymbolTable};
use smallcc::codegen::{generate, Codegen, CodegenError};
use smallcc::lexer::Lexer;
use smallcc::parser::{parse, Program};

fn generate_ast(input: &str) -> Program {
    let tokens = Lexer::tokenize(input).unwrap();
    parse(tokens).unwrap()
}

fn generate_asm(input: &str) -> String {
    let program = generate_ast(input);
    let table = analyze(&program).unwrap();
    generate(&program, &table).unwrap()
}

fn instructions(asm: &str) -> Vec<&str> {
    asm.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Asserts that `expected` appears as a contiguous run of lines in `asm`.
fn assert_sequence(asm: &str, expected: &[&str]) {
    let lines = instructions(asm);
    let found = lines.windows(expected.len()).any(|w| w == expected);
    assert!(found, "sequence {:#?} not found in:\n{}", expected, asm);
}

#[test]
fn round_trip_layout() {
    let asm = generate_asm("int main() { int x = 2; int y = 3; return x + y; }");
    let expected = "\
section .text
global _start

_start:
    call $main
    mov rdi, rax
    mov rax, 60
    syscall

$main:
    push rbp
    mov rbp, rsp
    sub rsp, 16
    mov rax, 2
    mov qword [rbp-8], rax
    mov rax, 3
    mov qword [rbp-16], rax
    mov rax, qword [rbp-8]
    push rax
    mov rax, qword [rbp-16]
    pop rbx
    add rbx, rax
    mov rax, rbx
    jmp .L000
.L000:
    mov rsp, rbp
    pop rbp
    ret

section .bss
";
    assert_eq!(asm, expected);
}

#[test]
fn no_frame_reservation_without_locals() {
    let asm = generate_asm("int main() { return 0; }");
    assert!(!asm.contains("sub rsp"));
    assert_sequence(&asm, &["$main:", "push rbp", "mov rbp, rsp", "mov rax, 0", "jmp .L000"]);
}

#[test]
fn globals() {
    let asm = generate_asm(
        "int g = 7;
char buf[4];
extern int ext;
char c;
int main() { return g + ext; }",
    );
    assert_sequence(
        &asm,
        &["_start:", "mov rax, 7", "mov qword [$g], rax", "call $main"],
    );
    assert_sequence(&asm, &["extern $ext", "$main:"]);
    assert_sequence(&asm, &["mov rax, qword [$g]", "push rax", "mov rax, qword [$ext]"]);
    assert_sequence(
        &asm,
        &["section .bss", "$g: resq 1", "$buf: resb 4", "$c: resb 1"],
    );
    assert!(!asm.contains("$ext: res"));
    assert!(asm.trim_end().ends_with("$c: resb 1"));
}

#[test]
fn extern_functions() {
    let asm = generate_asm("extern int putchar(int c); int main() { putchar(65); return 0; }");
    assert_sequence(&asm, &["extern $putchar", "$main:"]);
    assert_sequence(
        &asm,
        &["mov rax, 65", "push rax", "call $putchar", "add rsp, 8"],
    );
}

#[test]
fn char_values() {
    let asm = generate_asm("char c; int main() { char d = 'a'; c = d; return 0; }");
    assert_sequence(
        &asm,
        &[
            "mov rax, 97",
            "mov byte [rbp-8], al",
            "movzx rax, byte [rbp-8]",
            "mov byte [$c], al",
        ],
    );
}

#[test]
fn array_element_access() {
    let asm = generate_asm("int main() { int a[3]; a[1] = 5; return a[2]; }");
    assert_sequence(&asm, &["sub rsp, 32"]);
    assert_sequence(
        &asm,
        &[
            "mov rax, 5",
            "push rax",
            "mov rax, 1",
            "mov rbx, rax",
            "shl rbx, 3",
            "lea rdi, [rbp-24]",
            "add rdi, rbx",
            "pop rax",
            "mov qword [rdi], rax",
        ],
    );
    assert_sequence(
        &asm,
        &[
            "mov rax, 2",
            "mov rbx, rax",
            "shl rbx, 3",
            "lea rdi, [rbp-24]",
            "add rdi, rbx",
            "mov rax, qword [rdi]",
        ],
    );
}

#[test]
fn char_arrays_are_not_scaled() {
    let asm = generate_asm("char s[4]; int main() { s[3] = 'z'; s[0] = s[3]; return 0; }");
    assert!(!asm.contains("shl"));
    assert_sequence(&asm, &["lea rdi, [$s]", "add rdi, rbx", "pop rax", "mov byte [rdi], al"]);
    assert_sequence(&asm, &["lea rdi, [$s]", "add rdi, rbx", "movzx rax, byte [rdi]"]);
}

#[test]
fn array_parameters() {
    let asm = generate_asm(
        "int first(int v[]) { return v[0]; }
int main() { int a[2]; return first(a); }",
    );
    assert_sequence(
        &asm,
        &[
            "mov rax, 0",
            "mov rbx, rax",
            "shl rbx, 3",
            "mov rdi, qword [rbp+16]",
            "add rdi, rbx",
            "mov rax, qword [rdi]",
        ],
    );
    assert_sequence(
        &asm,
        &["lea rax, [rbp-16]", "push rax", "call $first", "add rsp, 8"],
    );
}

#[test]
fn calls_push_arguments_in_reverse() {
    let asm = generate_asm(
        "int minus(int a, int b) { return a - b; }
int main() { return minus(10, 4); }",
    );
    assert_sequence(
        &asm,
        &[
            "mov rax, qword [rbp+16]",
            "push rax",
            "mov rax, qword [rbp+24]",
            "pop rbx",
            "sub rbx, rax",
            "mov rax, rbx",
        ],
    );
    assert_sequence(
        &asm,
        &[
            "mov rax, 4",
            "push rax",
            "mov rax, 10",
            "push rax",
            "call $minus",
            "add rsp, 16",
        ],
    );
}

#[test]
fn call_without_arguments() {
    let asm = generate_asm("int f() { return 1; } int main() { return f(); }");
    assert_sequence(&asm, &["call $f", "jmp .L001"]);
    assert!(!asm.contains("add rsp"));
}

#[test]
fn each_function_has_its_own_epilogue() {
    let asm = generate_asm("int f() { return 1; } int main() { return 2; }");
    assert_sequence(
        &asm,
        &["mov rax, 1", "jmp .L000", ".L000:", "mov rsp, rbp", "pop rbp", "ret"],
    );
    assert_sequence(
        &asm,
        &["mov rax, 2", "jmp .L001", ".L001:", "mov rsp, rbp", "pop rbp", "ret"],
    );
}

#[test]
fn division_and_modulo() {
    let asm = generate_asm("int main() { return 7 / 2 + 7 % 3; }");
    assert_sequence(
        &asm,
        &[
            "mov rax, 2",
            "pop rbx",
            "mov rcx, rax",
            "mov rax, rbx",
            "cqo",
            "idiv rcx",
            "push rax",
        ],
    );
    assert_sequence(
        &asm,
        &[
            "mov rax, 3",
            "pop rbx",
            "mov rcx, rax",
            "mov rax, rbx",
            "cqo",
            "idiv rcx",
            "mov rax, rdx",
        ],
    );
}

#[test]
fn multiplication() {
    let asm = generate_asm("int main() { return 6 * 7; }");
    assert_sequence(&asm, &["mov rax, 7", "pop rbx", "imul rax, rbx"]);
}

#[test]
fn comparison_uses_labels() {
    let asm = generate_asm("int main() { return 1 <= 2; }");
    assert_sequence(
        &asm,
        &[
            "pop rbx",
            "cmp rbx, rax",
            "jle .L001",
            "mov rax, 0",
            "jmp .L002",
            ".L001:",
            "mov rax, 1",
            ".L002:",
            "jmp .L000",
        ],
    );
    assert!(!asm.contains("set"));
}

#[test]
fn logical_operators_evaluate_both_sides() {
    let asm = generate_asm("int main() { return 1 && 0 || !3; }");
    assert_sequence(
        &asm,
        &[
            "cmp rbx, 0",
            "je .L001",
            "cmp rax, 0",
            "je .L001",
            "mov rax, 1",
            "jmp .L002",
            ".L001:",
            "mov rax, 0",
            ".L002:",
        ],
    );
    assert_sequence(
        &asm,
        &[
            "mov rax, 3",
            "cmp rax, 0",
            "je .L003",
            "mov rax, 0",
            "jmp .L004",
            ".L003:",
            "mov rax, 1",
            ".L004:",
            "pop rbx",
            "cmp rbx, 0",
            "jne .L005",
            "cmp rax, 0",
            "jne .L005",
            "mov rax, 0",
            "jmp .L006",
            ".L005:",
            "mov rax, 1",
            ".L006:",
        ],
    );
}

#[test]
fn if_else() {
    let asm = generate_asm(
        "int main() { int x = 0; if (x) { x = 1; } else { x = 2; } return x; }",
    );
    assert_sequence(
        &asm,
        &[
            "mov rax, qword [rbp-8]",
            "cmp rax, 0",
            "je .L001",
            "mov rax, 1",
            "mov qword [rbp-8], rax",
            "jmp .L002",
            ".L001:",
            "mov rax, 2",
            "mov qword [rbp-8], rax",
            ".L002:",
        ],
    );
}

#[test]
fn if_without_else_allocates_one_label() {
    let asm = generate_asm("int main() { int x = 0; if (x) { x = 1; } return x; }");
    assert_sequence(
        &asm,
        &[
            "cmp rax, 0",
            "je .L001",
            "mov rax, 1",
            "mov qword [rbp-8], rax",
            ".L001:",
            "mov rax, qword [rbp-8]",
        ],
    );
    assert!(!asm.contains(".L002"));
}

#[test]
fn while_loop() {
    let asm = generate_asm("int main() { int x = 0; while (x < 3) { x = x + 1; } return x; }");
    assert_sequence(
        &asm,
        &[
            ".L001:",
            "mov rax, qword [rbp-8]",
            "push rax",
            "mov rax, 3",
            "pop rbx",
            "cmp rbx, rax",
            "jl .L003",
        ],
    );
    assert_sequence(
        &asm,
        &[
            ".L004:",
            "cmp rax, 0",
            "je .L002",
            "mov rax, qword [rbp-8]",
        ],
    );
    assert_sequence(
        &asm,
        &["mov qword [rbp-8], rax", "jmp .L001", ".L002:"],
    );
}

#[test]
fn for_loop() {
    let asm = generate_asm(
        "int main() { int i; int s = 0; for (i = 0; i < 3; i = i + 1) { s = s + i; } return s; }",
    );
    assert_sequence(
        &asm,
        &["mov rax, 0", "mov qword [rbp-8], rax", ".L001:"],
    );
    assert_sequence(&asm, &[".L004:", "cmp rax, 0", "je .L002"]);
    assert_sequence(
        &asm,
        &[
            "mov rax, qword [rbp-8]",
            "push rax",
            "mov rax, 1",
            "pop rbx",
            "add rbx, rax",
            "mov rax, rbx",
            "mov qword [rbp-8], rax",
            "jmp .L001",
            ".L002:",
        ],
    );
}

#[test]
fn for_without_clauses() {
    let asm = generate_asm("int main() { for (;;) { return 1; } }");
    assert_sequence(
        &asm,
        &[
            "mov rbp, rsp",
            ".L001:",
            "mov rax, 1",
            "jmp .L000",
            "jmp .L001",
            ".L002:",
        ],
    );
}

#[test]
fn statements_after_return_are_skipped() {
    let asm = generate_asm("int main() { return 1; return 2; }");
    assert!(!asm.contains("mov rax, 2"));
    assert_eq!(asm.matches("jmp .L000").count(), 1);
}

#[test]
fn missing_symbol_aborts() {
    let program = generate_ast("int main() { return x; }");
    let table = SymbolTable::new();
    assert_eq!(
        Codegen::new(&table).generate(&program).unwrap_err(),
        CodegenError::MissingSymbol {
            name: "x".to_string(),
            scope: "main".to_string(),
        }
    );
}

#[test]
fn generation_is_repeatable() {
    let program = generate_ast(
        "int g[2]; int f(int a) { if (a > 1) { return a; } return 0; }
int main() { g[0] = f(3); return g[0]; }",
    );
    let table = analyze(&program).unwrap();
    let first = generate(&program, &table).unwrap();
    let second = generate(&program, &table).unwrap();
    assert_eq!(first, second);
}

#[test]
fn register_names_stay_symbols() {
    let asm = generate_asm(
        "int rax;
char qword;
int rbx() { return 1; }
int main() { rax = 7; qword = 'q'; return rax + rbx(); }",
    );
    assert_sequence(&asm, &["mov rax, 7", "mov qword [$rax], rax"]);
    assert_sequence(&asm, &["mov rax, 113", "mov byte [$qword], al"]);
    assert_sequence(&asm, &["mov rax, qword [$rax]", "push rax", "call $rbx"]);
    assert_sequence(&asm, &["$rbx:", "push rbp"]);
    assert_sequence(&asm, &["section .bss", "$rax: resq 1", "$qword: resb 1"]);
    assert!(!asm.contains("[rax]"));
    assert!(!asm.contains("call rbx"));
}

#[test]
fn largest_frame() {
    let asm = generate_asm("int main() { char a[2147483632]; a[0] = 'x'; return 0; }");
    assert_sequence(&asm, &["mov rbp, rsp", "sub rsp, 2147483632"]);
}
