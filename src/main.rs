use fronius_bridge::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let options = Options::new();

    if fronius_bridge::app(options).await.is_err() {
        std::process::exit(255);
    }
}
