//! Interactive debugging shell inside the build container.

use crate::commands::session::Session;
use crate::container::WORKDIR;
use crate::error::Result;

/// Cross compiler exposed by the llvm-mingw image.
pub const TOOLCHAIN: &str = "x86_64-w64-mingw32-clang/clang++";

/// Open `bash` in the container with the terminal attached.
///
/// The shell's own exit status is not a failure; only an interrupt aborts.
pub async fn shell(session: &Session) -> Result<()> {
    let console = session.console();
    let invocation = session.container_invocation("bash")?;

    console.info("Opening interactive shell in container");
    if let Some(container) = session.container() {
        console.info(format!("Container runtime: {}", container.runtime()));
    }
    console.info(format!("Project mounted at: {WORKDIR}"));
    console.info(format!("Toolchain: {TOOLCHAIN}"));
    console.plain("");

    let code = session.run_interactive(&invocation).await?;
    log::debug!("shell exited with {code}");
    Ok(())
}
