use cage::kernel::Termination;
use machine::{ExceptionCause, MachineConfig};
use sysdefs::constants::machine_const::{PAGE_SIZE, STACK_PAGES};
use userkernel::programs::{self, POEM};
use userkernel::{KernelError, ProgramRegistry, UserContext, UserKernel};

fn config(shell: &str, args: &[&str]) -> MachineConfig {
    let mut config = MachineConfig::default();
    config.kernel.shell = shell.to_string();
    config.kernel.shell_args = args.iter().map(|a| a.to_string()).collect();
    config
}

fn sorted(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.sort_unstable();
    bytes
}

#[test]
fn test_exec_reports_two_child_ids() {
    let kernel = UserKernel::initialize(config("exec.coff", &[])).unwrap();
    let report = kernel.run().unwrap();
    assert_eq!(report.termination, Termination::LastExit);

    let line = report
        .output
        .lines()
        .find(|line| line.starts_with("ID1 is "))
        .expect("exec did not print its ids")
        .to_string();
    let ids: Vec<i64> = line
        .trim_start_matches("ID1 is ")
        .trim_end_matches('.')
        .split(", and ID2 is ")
        .map(|id| id.parse().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|&id| id > 0));
    assert_ne!(ids[0], ids[1]);

    // both children printed the whole poem, possibly interleaved
    let rest = report.output.replacen(&format!("{}\n", line), "", 1);
    assert_eq!(sorted(&rest), sorted(&POEM.repeat(2)));
    assert_eq!(
        kernel.machine().file_system().contents("test"),
        Some(POEM.as_bytes().to_vec())
    );
}

#[test]
fn test_write_copies_poem_to_console_and_file() {
    let kernel = UserKernel::initialize(config("write.coff", &[])).unwrap();
    let report = kernel.run().unwrap();
    assert_eq!(report.termination, Termination::LastExit);
    assert_eq!(report.output, POEM);
    assert_eq!(
        kernel.machine().file_system().contents("test"),
        Some(POEM.as_bytes().to_vec())
    );
    let memory = kernel.machine().memory();
    assert_eq!(memory.free_frame_count(), memory.num_pages());
}

fn report_fds(ctx: &mut UserContext) -> i32 {
    let created = ctx.creat("test");
    let opened = ctx.open("test");
    ctx.println(format_args!("{} {}", created, opened));
    0
}

#[test]
fn test_first_files_get_descriptors_two_and_three() {
    let mut registry = programs::builtin();
    registry.register("fds.coff", report_fds);
    let kernel = UserKernel::with_programs(config("fds.coff", &[]), registry).unwrap();
    assert_eq!(kernel.run().unwrap().output, "2 3\n");
}

#[test]
fn test_root_halt_stops_the_machine() {
    let kernel = UserKernel::initialize(config("halt.coff", &[])).unwrap();
    let report = kernel.run().unwrap();
    assert_eq!(report.termination, Termination::Halt);
    assert!(kernel.machine().is_halted());
    assert_eq!(report.output, "");
}

fn spawn_halter(ctx: &mut UserContext) -> i32 {
    let pid = ctx.exec("halt.coff", &["halt.coff"]);
    let mut status = -5;
    let joined = ctx.join(pid, &mut status);
    ctx.println(format_args!("{} {}", joined, status));
    0
}

#[test]
fn test_child_halt_is_refused() {
    let mut registry = programs::builtin();
    registry.register("parent.coff", spawn_halter);
    let kernel = UserKernel::with_programs(config("parent.coff", &[]), registry).unwrap();
    let report = kernel.run().unwrap();
    assert_eq!(report.termination, Termination::LastExit);
    // halt.coff falls through to `return 1`
    assert_eq!(report.output, "1 1\n");
}

#[test]
fn test_join_runs_echo_with_arguments() {
    let kernel = UserKernel::initialize(config("join.coff", &["echo.coff", "hello", "world"])).unwrap();
    let report = kernel.run().unwrap();
    let lines: Vec<&str> = report.output.lines().collect();
    assert_eq!(
        &lines[..4],
        &["3 arguments", "arg 0: echo.coff", "arg 1: hello", "arg 2: world"]
    );
    assert!(lines[4].starts_with("child "));
    assert!(lines[4].ends_with("exited with status 0, join returned 1"));
    assert_eq!(lines.len(), 5);
}

#[test]
fn test_cat_copies_files() {
    let kernel = UserKernel::initialize(config("cat.coff", &["poem.txt", "missing.txt"])).unwrap();
    kernel.machine().file_system().install("poem.txt", POEM.as_bytes().to_vec());
    let report = kernel.run().unwrap();
    assert_eq!(report.output, format!("{}Unable to open missing.txt\n", POEM));
}

fn fault(ctx: &mut UserContext) -> i32 {
    ctx.raise(ExceptionCause::AddressError)
}

fn crash(_ctx: &mut UserContext) -> i32 {
    panic!("user program bug");
}

fn overflow(ctx: &mut UserContext) -> i32 {
    ctx.write(1, &vec![b'x'; (STACK_PAGES + 1) * PAGE_SIZE]);
    0
}

fn bad_syscall(ctx: &mut UserContext) -> i32 {
    ctx.println(format_args!("before"));
    ctx.halt();
    ctx.close(-1);
    7
}

fn reap_all(ctx: &mut UserContext) -> i32 {
    for program in ["fault.coff", "crash.coff", "overflow.coff", "fine.coff"] {
        let pid = ctx.exec(program, &[]);
        let mut status = 0;
        let joined = ctx.join(pid, &mut status);
        ctx.println(format_args!("{} {} {}", program, joined, status));
    }
    0
}

#[test]
fn test_faulting_children_exit_abnormally() {
    let mut registry = ProgramRegistry::new();
    registry
        .register("reaper.coff", reap_all)
        .register("fault.coff", fault)
        .register("crash.coff", crash)
        .register("overflow.coff", overflow)
        .register("fine.coff", bad_syscall);
    let kernel = UserKernel::with_programs(config("reaper.coff", &[]), registry).unwrap();
    let report = kernel.run().unwrap();
    assert_eq!(report.termination, Termination::LastExit);
    assert_eq!(
        report.output,
        "fault.coff 0 -1\ncrash.coff 0 -1\noverflow.coff 0 -1\nbefore\nfine.coff 1 7\n"
    );
}

#[test]
fn test_unknown_shell_fails_to_start() {
    let kernel = UserKernel::initialize(config("nothing.coff", &[])).unwrap();
    assert!(matches!(kernel.run(), Err(KernelError::Spawn { .. })));
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut bad = config("exec.coff", &[]);
    bad.num_phys_pages = 0;
    assert!(matches!(UserKernel::initialize(bad), Err(KernelError::Config(_))));
}
