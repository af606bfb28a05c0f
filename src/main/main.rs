use echotimer::args;
use echotimer_core::Result;

fn main() -> Result {
	let args = args::parse();
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.expect("failed to build tokio runtime");

	runtime.block_on(echotimer::exec(&args))
}
