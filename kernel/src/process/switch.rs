// kernel/src/process/switch.rs
//
// Las tres rutinas de transferencia de control. Comparten el mismo marco
// guardado en la pila del kernel:
//
//   [esp+0]  edi
//   [esp+4]  esi
//   [esp+8]  ebx
//   [esp+12] ebp
//   [esp+16] dirección de retorno
//
// y guardan esp/ebp en un `Context`, así que cualquier contexto guardado
// por una se puede reanudar con `resume_context` o `switch_context`.

use core::arch::global_asm;

use super::Context;
use crate::process::tss::{USER_CODE_SELECTOR, USER_DATA_SELECTOR};

global_asm!(
    ".global switch_context",
    "switch_context:",
    "    mov eax, [esp + 4]",
    "    mov edx, [esp + 8]",
    "    push ebp",
    "    push ebx",
    "    push esi",
    "    push edi",
    "    mov [eax], esp",
    "    mov [eax + 4], ebp",
    "    mov esp, [edx]",
    "    mov ebp, [edx + 4]",
    "    pop edi",
    "    pop esi",
    "    pop ebx",
    "    pop ebp",
    "    ret",
    "",
    ".global resume_context",
    "resume_context:",
    "    mov edx, [esp + 4]",
    "    mov eax, [esp + 8]",
    "    mov esp, [edx]",
    "    mov ebp, [edx + 4]",
    "    pop edi",
    "    pop esi",
    "    pop ebx",
    "    pop ebp",
    "    ret",
    "",
    ".global enter_user",
    "enter_user:",
    "    mov eax, [esp + 4]",
    "    mov ecx, [esp + 8]",
    "    mov edx, [esp + 12]",
    "    push ebp",
    "    push ebx",
    "    push esi",
    "    push edi",
    "    test eax, eax",
    "    jz 2f",
    "    mov [eax], esp",
    "    mov [eax + 4], ebp",
    "2:",
    "    mov bx, {user_data}",
    "    mov ds, bx",
    "    mov es, bx",
    "    mov fs, bx",
    "    mov gs, bx",
    "    push {user_data}",
    "    push edx",
    "    pushfd",
    "    or dword ptr [esp], 0x200",
    "    push {user_code}",
    "    push ecx",
    "    iretd",
    user_data = const USER_DATA_SELECTOR,
    user_code = const USER_CODE_SELECTOR,
);

extern "C" {
    /// Guarda el contexto de kernel actual en `old` y reanuda `new`.
    /// Vuelve cuando alguien reanuda `old`.
    pub fn switch_context(old: *mut Context, new: *const Context);

    /// Reanuda `context`; la llamada que lo guardó devuelve `value`.
    pub fn resume_context(context: *const Context, value: u32) -> !;

    /// Baja a ring 3 en `entry` con interrupciones habilitadas. Si `save` no
    /// es nulo primero guarda ahí el contexto de kernel actual, y esta
    /// llamada devuelve el valor que pase un `resume_context` posterior.
    pub fn enter_user(save: *mut Context, entry: u32, user_stack: u32) -> u32;
}
