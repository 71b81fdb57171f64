use std::{
    env,
    path::{Path, PathBuf},
    process,
    str::FromStr,
    sync::Arc,
};

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;

use medicare_registration::{
    client::{RegistrationApi, RegistrationClient},
    config::Config,
    draft::{Attachment, AttachmentSlot, ProfileField},
    error::ErrorNormalizer,
    flow::{FlowController, Message, Step, ViewMessage},
    logger,
    role::Role,
    validation::format_phone_for_display,
    VERSION,
};

const COMMANDS: &str = r#"
Commands:
    name <full name>             Set the full name
    email <address>              Set the email address
    phone <number>               Set the phone number, country code included
    password <password>          Set the password
    confirm <password>           Repeat the password
    agree [yes|no]               Accept the Terms of Service
    otp <code>                   Enter the code received by email
    resend                       Send a new code
    profile <field> <value>      Set a profile field: dob (YYYY-MM-DD), gender,
                                 id-type, id-number, nationality, address,
                                 postcode, state, city
    attach <photo|id> <path>     Attach the profile photo or the ID document
    submit                       Submit the current step
    status                       Show the current step
    back                         Leave this registration
    role <role>                  Start over as customer, nurse, vendor or doctor
    help                         Show this message
    quit                         Exit
"#;

fn print_help_exit(code: i32) -> ! {
    eprintln!("medicare-register version {}", VERSION);
    eprintln!();
    eprintln!("Usage: medicare-register [--conf <PATH>] [--role <ROLE>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    --conf <PATH>    Path of the configuration file");
    eprintln!("    --role <ROLE>    customer (default), nurse, vendor or doctor");
    eprintln!("    -v, --version    Display medicare-register version");
    eprintln!("    -h, --help       Print help");
    eprintln!();
    eprintln!("By default the configuration is read from 'MediCare/medicare.toml' in the XDG standard configuration directory.");
    eprintln!("{}", COMMANDS);
    process::exit(code);
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    conf: Option<PathBuf>,
    role: Option<Role>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut res = Args::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--conf" => {
                let path = iter.next().ok_or("missing arg to --conf")?;
                res.conf = Some(PathBuf::from(path));
            }
            "--role" => {
                let role = iter.next().ok_or("missing arg to --role")?;
                res.role = Some(Role::from_str(role).map_err(|e| e.to_string())?);
            }
            _ => return Err(format!("unknown argument '{}'", arg)),
        }
    }
    Ok(res)
}

#[derive(Debug)]
enum Command {
    View(Vec<ViewMessage>),
    Attach(AttachmentSlot, PathBuf),
    Status,
    Help,
    Role(Role),
    Quit,
}

fn profile_field(name: &str) -> Option<ProfileField> {
    match name {
        "dob" | "date-of-birth" => Some(ProfileField::DateOfBirth),
        "gender" => Some(ProfileField::Gender),
        "id-type" => Some(ProfileField::IdType),
        "id-number" => Some(ProfileField::IdNumber),
        "nationality" => Some(ProfileField::Nationality),
        "address" => Some(ProfileField::Address),
        "postcode" => Some(ProfileField::Postcode),
        "state" => Some(ProfileField::State),
        "city" => Some(ProfileField::City),
        _ => None,
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let view = |msg: ViewMessage| -> Result<Command, String> { Ok(Command::View(vec![msg])) };

    match cmd {
        "name" => view(ViewMessage::FullNameEdited(rest.to_string())),
        "email" => view(ViewMessage::EmailEdited(rest.to_string())),
        "phone" => view(ViewMessage::PhoneEdited(rest.to_string())),
        "password" => view(ViewMessage::PasswordEdited(rest.to_string())),
        "confirm" => view(ViewMessage::ConfirmPasswordEdited(rest.to_string())),
        "agree" => match rest {
            "" | "yes" => view(ViewMessage::AgreementToggled(true)),
            "no" => view(ViewMessage::AgreementToggled(false)),
            _ => Err("usage: agree [yes|no]".to_string()),
        },
        "otp" => {
            let digits: Vec<char> = rest.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(Command::View(
                (0..6)
                    .map(|i| {
                        ViewMessage::DigitEdited(
                            i,
                            digits.get(i).map(|c| c.to_string()).unwrap_or_default(),
                        )
                    })
                    .collect(),
            ))
        }
        "resend" => view(ViewMessage::Resend),
        "profile" => {
            let (name, value) = rest.split_once(' ').ok_or("usage: profile <field> <value>")?;
            let field = profile_field(name).ok_or(format!("unknown profile field '{}'", name))?;
            view(ViewMessage::ProfileEdited(field, value.trim().to_string()))
        }
        "attach" => {
            let (slot, path) = rest.split_once(' ').ok_or("usage: attach <photo|id> <path>")?;
            let slot = match slot {
                "photo" => AttachmentSlot::ProfilePhoto,
                "id" => AttachmentSlot::IdDocument,
                _ => return Err("usage: attach <photo|id> <path>".to_string()),
            };
            Ok(Command::Attach(slot, PathBuf::from(path.trim())))
        }
        "submit" => view(ViewMessage::Submit),
        "back" => view(ViewMessage::SelectAnotherRole),
        "role" => Role::from_str(rest)
            .map(Command::Role)
            .map_err(|e| e.to_string()),
        "status" => Ok(Command::Status),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(format!("unknown command '{}', type 'help'", cmd)),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

async fn read_attachment(path: &Path) -> Result<Attachment, std::io::Error> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    Ok(Attachment::new(file_name, content_type(path), bytes))
}

fn print_status(ctrl: &FlowController) {
    let step = match ctrl.step() {
        Step::Registering => "registration form",
        Step::AwaitingOtp => "email verification",
        Step::CompletingProfile => "profile completion",
        Step::Succeeded => "registration complete",
        Step::Abandoned => "registration abandoned",
    };
    println!("[{}] {}", ctrl.role().display_name(), step);

    if let Some(draft) = ctrl.draft() {
        if ctrl.step() == Step::Registering && !draft.phone_number.is_empty() {
            println!("    phone: {}", format_phone_for_display(&draft.phone_number));
        }
    }
    if let Some(otp) = ctrl.otp() {
        println!("    code sent to {}", otp.target_email());
        if otp.resend_allowed() {
            println!("    you can request a new code");
        } else {
            println!("    new code available in {}s", otp.seconds_remaining());
        }
    }
    if ctrl.is_pending() {
        println!("    please wait...");
    }
    if let Some(e) = ctrl.error() {
        match e.field() {
            Some(field) => println!("    error ({}): {}", field, e),
            None => println!("    error: {}", e),
        }
    }
}

enum Outcome {
    Quit,
    Restart(Role),
}

async fn run(
    ctrl: &mut FlowController,
    inbox: &mut UnboundedReceiver<Message>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Outcome {
    print_status(ctrl);
    loop {
        if ctrl.step() == Step::Succeeded && !ctrl.redirect_armed() {
            match ctrl.redirect_target() {
                Some(url) => println!("Continue at {}", url),
                None => println!("You can now log in from the mobile application."),
            }
            return Outcome::Quit;
        }

        tokio::select! {
            Some(msg) = inbox.recv() => {
                let is_tick = matches!(msg, Message::Tick(_));
                let could_resend = ctrl.otp().is_some_and(|otp| otp.resend_allowed());
                ctrl.update(msg);
                let can_resend = ctrl.otp().is_some_and(|otp| otp.resend_allowed());
                if !is_tick || can_resend != could_resend {
                    print_status(ctrl);
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => return Outcome::Quit,
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        return Outcome::Quit;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(Command::View(msgs)) => {
                        for msg in msgs {
                            ctrl.update(msg.into());
                        }
                        print_status(ctrl);
                    }
                    Ok(Command::Attach(slot, path)) => match read_attachment(&path).await {
                        Ok(attachment) => {
                            println!("Attached {} ({} bytes)", attachment.file_name, attachment.len());
                            ctrl.update(ViewMessage::AttachmentSelected(slot, Some(attachment)).into());
                        }
                        Err(e) => println!("Cannot read {}: {}", path.display(), e),
                    },
                    Ok(Command::Status) => print_status(ctrl),
                    Ok(Command::Help) => println!("{}", COMMANDS),
                    Ok(Command::Role(role)) => {
                        ctrl.update(ViewMessage::SelectAnotherRole.into());
                        return Outcome::Restart(role);
                    }
                    Ok(Command::Quit) => return Outcome::Quit,
                    Err(e) => println!("{}", e),
                }
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        print_help_exit(0);
    }
    if args.len() > 1 && (args[1] == "--version" || args[1] == "-v") {
        eprintln!("{}", VERSION);
        process::exit(0);
    }
    let args = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("{}", e);
        print_help_exit(1)
    });

    let config = Config::from_file(args.conf).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        print_help_exit(1)
    });
    let log_level = logger::parse_log_level()
        .unwrap_or_else(|e| {
            eprintln!("{}", e);
            process::exit(1);
        })
        .unwrap_or(config.log_level);
    logger::setup_logger(log_level, config.log_file.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error setting up logger: {}", e);
        process::exit(1);
    });

    let client = RegistrationClient::new(
        config.api_url.as_str(),
        config.request_timeout_secs,
        ErrorNormalizer::default(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Error creating the HTTP client: {}", e);
        process::exit(1);
    });
    tracing::info!("Using registration API at {}", client.api_url());
    let api: Arc<dyn RegistrationApi> = Arc::new(client);

    let mut role = args.role.unwrap_or(Role::Customer);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type 'help' for the list of commands.");
    loop {
        let (mut ctrl, mut inbox) = FlowController::new(role, config.flow_settings(), api.clone());
        match run(&mut ctrl, &mut inbox, &mut lines).await {
            Outcome::Quit => break,
            Outcome::Restart(next) => role = next,
        }
    }
}
