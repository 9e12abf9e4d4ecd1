// kernel/src/main.rs
//
// Imagen multiboot. Se construye con:
//   cargo build -p trios-kernel --no-default-features --target i686-trios.json \
//       -Zbuild-std=core -Zbuild-std-features=compiler-builtins-mem
// En el host este binario solo avisa de que no hay nada que correr.

#![cfg_attr(all(target_arch = "x86", target_os = "none"), no_std, no_main)]

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod boot {
    use core::arch::global_asm;

    // Cabecera multiboot v1 (flags: alinear módulos + mapa de memoria),
    // pila de arranque de 256 KiB y `_start`.
    global_asm!(
        r#"
.set MB_MAGIC,    0x1BADB002
.set MB_FLAGS,    0x00000003
.set MB_CHECKSUM, -(MB_MAGIC + MB_FLAGS)

.section .multiboot, "a"
.align 4
.long MB_MAGIC
.long MB_FLAGS
.long MB_CHECKSUM

.section .bss
.align 16
boot_stack_bottom:
.skip 262144
boot_stack_top:

.section .text
.global _start
_start:
    cli
    mov esp, offset boot_stack_top
    xor ebp, ebp
    push ebx
    push eax
    call kernel_main
2:
    hlt
    jmp 2b
"#
    );

    // Trae el kernel (y `kernel_main`) al enlazado.
    use trios as _;
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
fn main() {
    println!("trios-kernel: the kernel image only runs on the i686-trios target");
    println!("run `cargo test -p trios-kernel` to exercise the core on the host");
}
