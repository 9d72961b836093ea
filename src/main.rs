fn main() {
    if let Err(e) = subscription_service_lib::run() {
        log::error!("アプリケーションの起動に失敗しました: {}", e.details());
        eprintln!("{e}");
        std::process::exit(1);
    }
}
