use std::path::PathBuf;

use clap::Parser;
use course_server::{
    config::Config,
    course::{get_courses_by_instructor, publish_course},
    db::{self, Pagination},
    user::{NewUser, Role, get_user_list, register_user},
    utils::init_log,
};

#[derive(Debug, clap::Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Course {
        #[command(subcommand)]
        command: CourseCommand,
    },
}

#[derive(Debug, clap::Subcommand)]
enum UserCommand {
    List,
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// Create an instructor instead of a student
        #[arg(long)]
        instructor: bool,
    },
}

#[derive(Debug, clap::Subcommand)]
enum CourseCommand {
    /// List the courses of one instructor
    List {
        instructor_id: i64,
        #[arg(long, default_value = "1")]
        page: u32,
    },
    Publish {
        course_id: i64,
        #[arg(short, long)]
        instructor_id: i64,
    },
}

#[tokio::main]
async fn main() {
    let _guard = init_log(None);
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{:?}", e);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let database = db::connect(&config.database_url).await?;

    match args.command {
        Commands::User { command } => match command {
            UserCommand::List => {
                for user in get_user_list(&database).await? {
                    let role = format!("{:?}", user.role);
                    println!("{:<8} {:<12} {:<30} {}", user.id, role, user.email, user.name);
                }
            }
            UserCommand::Create {
                name,
                email,
                password,
                instructor,
            } => {
                let role = if instructor { Role::Instructor } else { Role::Student };
                let user = register_user(
                    &database,
                    NewUser {
                        name,
                        email,
                        password,
                        role,
                        image: None,
                        bio: None,
                    },
                )
                .await?;
                println!("User created with id: {}", user.id);
            }
        },
        Commands::Course { command } => match command {
            CourseCommand::List {
                instructor_id,
                page,
            } => {
                let courses =
                    get_courses_by_instructor(&database, instructor_id, &Pagination::new(page, 20))
                        .await?;
                for summary in courses.items {
                    let course = summary.course;
                    let status = format!("{:?}", course.status);
                    println!(
                        "{:<8} {:<10} {:>4} students {:>4.1} stars  {}",
                        course.id, status, summary.student_count, summary.average_rating, course.title
                    );
                }
                println!("page {}/{}", courses.page, courses.total_pages);
            }
            CourseCommand::Publish {
                course_id,
                instructor_id,
            } => {
                let course = publish_course(&database, course_id, instructor_id).await?;
                println!("Course published: {}", course.title);
            }
        },
    }
    Ok(())
}
