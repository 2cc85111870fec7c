// Unvalidated strings cannot be passed as pre-validated shell arguments.
use pushdeploy::shell::ShellCommand;

fn main() {
    let user_input = String::from("api; rm -rf /");
    let _ = ShellCommand::new("pm2").arg("restart").safe(&user_input);
}
