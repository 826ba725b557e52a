use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use suliko_client::blog::BlogIndex;
use suliko_client::cli::{
    AdminCommand, BlogCommand, Cli, Command, JobCommand, LanguagesCommand, ProfileCommand,
    ServiceCommand, SuggestionsArgs, SuggestionsCommand, TranslateCommand, UsersCommand,
};
use suliko_client::config::Config;
use suliko_client::document::{DocumentUpload, DocumentWorkspace, SuggestionReview};
use suliko_client::session::SessionStore;
use suliko_client::user::{SortDirection, UserColumn, UserPatch, UserTable};
use suliko_client::validation::{LanguageForm, LoginForm, ProfileForm, RegistrationForm};
use suliko_client::{ApiClient, ApiError};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_directive().parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    // Blog content is bundled and needs no backend
    let command = match cli.command {
        Command::Blog(command) => return Ok(run_blog(&command)),
        Command::Service(command) => command,
    };

    let config = Config::from_env()?;
    debug!("Using backend at {}", config.api_base_url);
    let session = SessionStore::load(config.session_file.clone()).await;
    let client = ApiClient::new(&config, session)?;

    match run(&client, command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            debug!("Command failed: {:?}", e);
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(client: &ApiClient, command: ServiceCommand) -> Result<(), ApiError> {
    match command {
        ServiceCommand::SendCode { phone } => {
            client.send_verification_code(&phone).await?;
            println!("Verification code sent");
        }

        ServiceCommand::Login { phone, password } => {
            let session = client.login_with_phone(&LoginForm { phone, password }).await?;
            match session.user {
                Some(user) => println!("Logged in as {}", user.display_name()),
                None => println!("Logged in"),
            }
        }

        ServiceCommand::Register(args) => {
            let form = RegistrationForm {
                phone: args.phone,
                verification_code: args.code,
                password: args.password,
                confirm_password: args.confirm_password,
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
            };
            match client.register_with_phone(&form).await? {
                Some(_) => println!("Account created, you are logged in"),
                None => println!("Account created, log in to continue"),
            }
        }

        ServiceCommand::Logout => {
            client.logout().await?;
            println!("Logged out");
        }

        ServiceCommand::Whoami => {
            let user = client.current_user().await?;
            println!("{}", user.display_name());
            if let Some(phone) = &user.phone_number {
                println!("  phone:   {}", phone);
            }
            if let Some(email) = &user.email {
                println!("  email:   {}", email);
            }
            println!("  role:    {}", user.role_name.as_deref().unwrap_or("user"));
            println!("  balance: {:.2}", user.balance);
        }

        ServiceCommand::Profile(ProfileCommand::Update(args)) => {
            let form = ProfileForm {
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                phone: args.phone,
            };
            let user = client.update_profile(&form).await?;
            println!("Profile updated for {}", user.display_name());
        }

        ServiceCommand::Languages(command) => run_languages(client, command).await?,

        ServiceCommand::Translate(TranslateCommand::Text { text, to, from }) => {
            let target = client.resolve_language(&to).await?;
            let source = match from {
                Some(from) => Some(client.resolve_language(&from).await?.id),
                None => None,
            };
            let translation = client.translate_text(&text, target.id, source).await?;
            println!("{}", translation.translated_text);
            if let Some(detected) = translation.detected_language {
                info!("Detected source language: {}", detected);
            }
        }

        ServiceCommand::Translate(TranslateCommand::Document {
            file,
            to,
            from,
            kind,
            output,
        }) => {
            let target = client.resolve_language(&to).await?;
            let source = match from {
                Some(from) => Some(client.resolve_language(&from).await?.id),
                None => None,
            };
            let upload = DocumentUpload::from_path(&file, target.id, source, kind).await?;
            let workspace = DocumentWorkspace::new();

            let translated = client
                .translate_document(&upload, &workspace, |status| {
                    eprintln!("{}", status.describe());
                })
                .await?;

            let path = translated.result.save(output, &file, &translated.job_id).await?;
            println!("Saved translation to {}", path.display());
            if !translated.suggestions.is_empty() {
                println!(
                    "{} suggestions available: suliko job suggestions {}",
                    translated.suggestions.len(),
                    translated.job_id
                );
            }
        }

        ServiceCommand::Job(JobCommand::Status { job_id }) => {
            let status = client.job_status(&job_id).await?;
            println!("{}", status.describe());
        }

        ServiceCommand::Job(JobCommand::Wait { job_id }) => {
            let status = client
                .wait_for_job(&job_id, |status| eprintln!("{}", status.describe()))
                .await?;
            println!("{}", status.describe());
        }

        ServiceCommand::Job(JobCommand::Result { job_id, output }) => {
            let result = client.job_result(&job_id).await?;
            let path = result.save(output, Path::new("document"), &job_id).await?;
            println!("Saved translation to {}", path.display());
        }

        ServiceCommand::Job(JobCommand::Suggestions { job_id }) => {
            let suggestions = client.suggestions(&job_id).await?;
            if suggestions.is_empty() {
                println!("No suggestions for job {}", job_id);
            }
            for s in suggestions {
                println!("[{}] {}", s.id, s.title);
                if !s.description.is_empty() {
                    println!("    {}", s.description);
                }
                println!("    - {}", s.original_text);
                println!("    + {}", s.suggested_text);
            }
        }

        ServiceCommand::Suggestions(SuggestionsCommand::Apply(args)) => {
            run_apply_suggestions(client, args).await?
        }

        ServiceCommand::Admin(AdminCommand::Users(command)) => run_users(client, command).await?,
    }
    Ok(())
}

async fn run_languages(client: &ApiClient, command: LanguagesCommand) -> Result<(), ApiError> {
    match command {
        LanguagesCommand::List => {
            for language in client.list_languages().await? {
                println!("{:>4}  {}", language.id, language.label());
            }
        }
        LanguagesCommand::Add { name, name_geo } => {
            client.add_language(&LanguageForm { name, name_geo }).await?;
            println!("Language added");
        }
        LanguagesCommand::Delete { id } => {
            client.delete_language(id).await?;
            println!("Language {} deleted", id);
        }
    }
    Ok(())
}

async fn run_apply_suggestions(client: &ApiClient, args: SuggestionsArgs) -> Result<(), ApiError> {
    let mut review = SuggestionReview::new(client.suggestions(&args.job_id).await?);

    for id in &args.accept {
        review.accept(id)?;
    }
    for id in &args.reject {
        review.reject(id)?;
    }
    for (id, text) in &args.edit {
        review.edit(id, text)?;
    }
    if args.accept_all {
        review.accept_all();
    }

    let applied = client.apply_review(&args.job_id, &mut review).await?;
    println!(
        "Applied {} suggestions, {} left undecided",
        applied,
        review.pending_count()
    );
    Ok(())
}

async fn run_users(client: &ApiClient, command: UsersCommand) -> Result<(), ApiError> {
    match command {
        UsersCommand::List {
            search,
            sort_balance,
        } => {
            let mut table = UserTable::new(client.list_users().await?);
            if let Some(query) = search {
                table.set_query(&query);
            }
            for _ in 0..sort_balance.min(2) {
                table.toggle_sort(UserColumn::Balance);
            }
            if let Some((_, direction)) = table.sort_state() {
                debug!(
                    "Sorting by balance {}",
                    if direction == SortDirection::Asc { "ascending" } else { "descending" }
                );
            }
            for user in table.rows() {
                println!(
                    "{:<38} {:<28} {:<14} {:<8} {:>10.2}",
                    user.id,
                    user.display_name(),
                    user.phone_number.as_deref().unwrap_or("-"),
                    user.role_name.as_deref().unwrap_or("-"),
                    user.balance
                );
            }
        }
        UsersCommand::SetBalance { user_id, balance } => {
            let patch = UserPatch {
                balance: Some(balance),
                ..Default::default()
            };
            let user = client.patch_user(&user_id, &patch).await?;
            println!("Balance for {} is now {:.2}", user.display_name(), user.balance);
        }
        UsersCommand::Delete { user_id } => {
            client.delete_user(&user_id).await?;
            println!("User {} deleted", user_id);
        }
    }
    Ok(())
}

fn run_blog(command: &BlogCommand) -> ExitCode {
    let index = BlogIndex::get();
    match command {
        BlogCommand::Search { query, category } => {
            if let Some(slug) = category.as_deref() {
                if index.category(slug).is_none() {
                    eprintln!("Unknown category '{}'", slug);
                    return ExitCode::FAILURE;
                }
            }
            for post in index.search(query, category.as_deref()) {
                println!("{}  {:<30} {}", post.published_at, post.slug, post.title);
            }
        }
        BlogCommand::Show { slug } => match index.post(slug) {
            Some(post) => {
                println!("{}", post.title);
                println!(
                    "{} | {} | {} min read",
                    post.author, post.published_at, post.reading_minutes
                );
                println!();
                println!("{}", post.excerpt);
                if !post.tags.is_empty() {
                    println!();
                    println!("#{}", post.tags.join(" #"));
                }
            }
            None => {
                eprintln!("No post named '{}'", slug);
                return ExitCode::FAILURE;
            }
        },
        BlogCommand::Categories => {
            for category in index.categories() {
                println!("{:<12} {} ({})", category.slug, category.name, category.name_geo);
            }
        }
    }
    ExitCode::SUCCESS
}
