//! User programs shipped with the kernel, each installed as `<name>.coff`.
use crate::context::UserContext;
use crate::launcher::ProgramRegistry;
use machine::coff::{STYP_DATA, STYP_RDATA, STYP_TEXT};
use machine::CoffBuilder;

/// Text the write test copies to the console and to its file.
pub const POEM: &str = "\nroses are red\nviolets are blue\nI love Nachos\nand so do you\n\n";

/// Starts two copies of the write test and reports both process ids.
pub fn exec_test(ctx: &mut UserContext) -> i32 {
    let id1 = ctx.exec("write.coff", &[]);
    let id2 = ctx.exec("write.coff", &[]);
    ctx.println(format_args!("ID1 is {}, and ID2 is {}.", id1, id2));
    0
}

/// Creates and opens `test`, then writes the poem one byte at a time to
/// the console (fd 1) and to both descriptors on the file (fds 2 and 3).
pub fn write_test(ctx: &mut UserContext) -> i32 {
    ctx.creat("test");
    ctx.open("test");

    for byte in POEM.bytes() {
        ctx.write(1, &[byte]);
        ctx.write(2, &[byte]);
        ctx.write(3, &[byte]);
    }

    let mut scratch = [0u8; 1];
    ctx.read(2, &mut scratch);
    ctx.read(3, &mut scratch);
    0
}

pub fn halt(ctx: &mut UserContext) -> i32 {
    ctx.halt();
    // only reached when the caller may not halt
    1
}

/// Prints its arguments.
pub fn echo(ctx: &mut UserContext) -> i32 {
    let args = ctx.args();
    ctx.println(format_args!("{} arguments", args.len()));
    for (i, arg) in args.iter().enumerate() {
        ctx.println(format_args!("arg {}: {}", i, arg));
    }
    0
}

/// Runs `argv[1]` (default `echo.coff`) with the remaining arguments and
/// waits for it.
pub fn join_test(ctx: &mut UserContext) -> i32 {
    let args = ctx.args();
    let program = args.get(1).map(String::as_str).unwrap_or("echo.coff");
    let child_args: Vec<&str> = std::iter::once(program)
        .chain(args.iter().skip(2).map(String::as_str))
        .collect();

    let pid = ctx.exec(program, &child_args);
    if pid < 0 {
        ctx.println(format_args!("exec {} failed", program));
        return 1;
    }
    let mut status = 0;
    let joined = ctx.join(pid, &mut status);
    ctx.println(format_args!("child {} exited with status {}, join returned {}", pid, status, joined));
    if joined == 1 {
        0
    } else {
        1
    }
}

/// Copies each file named in its arguments to the console.
pub fn cat(ctx: &mut UserContext) -> i32 {
    let args = ctx.args();
    let mut status = 0;
    for name in args.iter().skip(1) {
        let fd = ctx.open(name);
        if fd < 0 {
            ctx.println(format_args!("Unable to open {}", name));
            status = 1;
            continue;
        }
        let mut buf = [0u8; 64];
        loop {
            let n = ctx.read(fd, &mut buf);
            if n <= 0 {
                break;
            }
            ctx.write(1, &buf[..n as usize]);
        }
        ctx.close(fd);
    }
    status
}

/// Registry holding every builtin program.
pub fn builtin() -> ProgramRegistry {
    let mut registry = ProgramRegistry::new();
    registry
        .register("exec.coff", exec_test)
        .register("write.coff", write_test)
        .register("halt.coff", halt)
        .register("echo.coff", echo)
        .register("join.coff", join_test)
        .register("cat.coff", cat);
    registry
}

/// Executable image installed for `name`: a text page, its name as
/// read-only data and a small data section.
pub fn executable_image(name: &str) -> Vec<u8> {
    let mut text = name.as_bytes().to_vec();
    text.resize(64, 0);
    let mut rdata = name.as_bytes().to_vec();
    rdata.push(0);
    CoffBuilder::new(0)
        .section(".text", STYP_TEXT, &text)
        .section(".rdata", STYP_RDATA, &rdata)
        .section(".data", STYP_DATA, &[0; 16])
        .bss(".bss", 256)
        .build()
}
