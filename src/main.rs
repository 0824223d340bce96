use std::io;

fn main() -> io::Result<()> {
    jobflare::app::run()
}
