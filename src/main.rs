use histboost::application::Application;
use histboost::core::utils::log::Log;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = Application::new(&args).and_then(|app| app.run());
    if let Err(err) = result {
        Log::fatal(&err.to_string());
        std::process::exit(1);
    }
}
